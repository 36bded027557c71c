#![no_main]

use gamewire::PacketReader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fuzz field parsing - every read either succeeds or reports an incomplete packet
    let mut reader = PacketReader::new(data);
    let _ = reader.read_u16();
    let _ = reader.read_length_string();
    let _ = reader.read_padded_string(13);
    let _ = reader.read_i64();
    let _ = reader.read_bool();
});
