use secrecy::SecretString;
use shv_crypto::{decrypt_fragment, derive_key, encrypt_fragment};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt_fragment(bencher: divan::Bencher, size: usize) {
    let key = derive_key(&SecretString::from("bench-password"));
    let file_id = [0xABu8; 16];
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            encrypt_fragment(
                divan::black_box(&key),
                0,
                divan::black_box(&file_id),
                divan::black_box(&data),
            )
            .unwrap()
        });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt_fragment(bencher: divan::Bencher, size: usize) {
    let key = derive_key(&SecretString::from("bench-password"));
    let file_id = [0xABu8; 16];
    let data = make_data(size);
    let encrypted = encrypt_fragment(&key, 0, &file_id, &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decrypt_fragment(
                divan::black_box(&key),
                0,
                divan::black_box(&file_id),
                divan::black_box(&encrypted),
            )
            .unwrap()
        });
}

#[divan::bench]
fn bench_derive_key() -> shv_crypto::DerivedKey {
    derive_key(divan::black_box(&SecretString::from("correct-horse")))
}

fn main() {
    divan::main();
}
