use criterion::{black_box, criterion_group, criterion_main, Criterion};
use teleinfo_rs::teleinfo::checksum::checksum;
use teleinfo_rs::teleinfo::line::parse_line;
use teleinfo_rs::teleinfo::serial_mock::encode_frame;
use teleinfo_rs::{FieldTable, FrameAssembler};

const GROUPS: &[(&str, &str)] = &[
    ("ADCO", "000000000000"),
    ("OPTARIF", "BBR("),
    ("ISOUSC", "45"),
    ("BBRHCJB", "001234567"),
    ("BBRHPJB", "002345678"),
    ("PTEC", "HPJB"),
    ("DEMAIN", "----"),
    ("IINST", "007"),
    ("IMAX", "090"),
    ("PAPP", "01070"),
    ("HHPHC", "A"),
    ("MOTDETAT", "000000"),
];

fn benchmark_checksum(c: &mut Criterion) {
    c.bench_function("checksum", |b| {
        b.iter(|| checksum(black_box(b"BBRHCJB 001234567")))
    });
}

fn benchmark_parse_line(c: &mut Criterion) {
    let line = b"BBRHCJB 001234567 9\r\n";
    c.bench_function("parse_line", |b| {
        b.iter(|| {
            let result = parse_line(black_box(line));
            let _ = black_box(result);
        })
    });
}

fn benchmark_assemble_frame(c: &mut Criterion) {
    let stream = encode_frame(GROUPS);
    let lines: Vec<&[u8]> = stream.split_inclusive(|b| *b == b'\n').collect();

    c.bench_function("assemble_frame", |b| {
        b.iter(|| {
            let mut asm = FrameAssembler::new(FieldTable::default());
            for line in &lines {
                let _ = black_box(asm.push_line(line));
            }
        })
    });
}

criterion_group!(
    benches,
    benchmark_checksum,
    benchmark_parse_line,
    benchmark_assemble_frame
);
criterion_main!(benches);
