#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Every accepted record must encode back to the same bytes
    if let Ok((entity, len)) = eodb::osm::record::decode(data) {
        let mut buf = Vec::new();
        let written = eodb::osm::record::encode(&entity, &mut buf).expect("decoded entity must encode");
        assert_eq!(written, len);
        assert_eq!(&buf[..], &data[..len]);
    }
    for record in eodb::osm::record::Records::new(data, 0) {
        if record.is_err() {
            break;
        }
    }
});
