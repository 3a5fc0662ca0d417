use shv_chunks::{digest_hex, merge, split};

fn make_data(size: usize) -> Vec<u8> {
    // Semi-realistic data: repeating pattern with some entropy
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576, 10485760])]
fn fixed_split(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| split(divan::black_box(&data), 64 * 1024));
}

#[divan::bench(args = [1024, 65536, 1048576, 10485760])]
fn split_then_merge(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            let chunks = split(divan::black_box(&data), 64 * 1024);
            merge(chunks.iter().map(|c| &c.data))
        });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn fragment_digest(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| digest_hex(divan::black_box(&data)));
}

fn main() {
    divan::main();
}
