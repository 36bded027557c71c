#![no_main]

use bytes::BytesMut;
use gamewire::config::NetworkConfig;
use gamewire::core::codec::FrameDecoder;
use gamewire::crypto::endpoint::server_crypto;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Fuzz frame decoding - headers, lengths and partial frames must never panic
    if data.len() < 8 {
        return;
    }
    let factory = NetworkConfig::default().crypto.factory();
    let Ok(crypto) = server_crypto(&factory, &data[..4], &data[4..8]) else {
        return;
    };
    let (_, decryptor) = crypto.into_parts();
    let mut decoder = FrameDecoder::new(decryptor, data[0] & 1 == 1);

    let mut inbox = BytesMut::from(&data[8..]);
    while let Ok(Some(_)) = decoder.decode(&mut inbox) {}
});
