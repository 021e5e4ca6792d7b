#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsed lines survive a format/parse round
    for line in data.lines() {
        if let Ok(Some(entity)) = eodb::osm::opl::parse_line(line) {
            let text = eodb::osm::opl::format_entity(&entity);
            let again = eodb::osm::opl::parse_line(&text);
            assert_eq!(again, Ok(Some(entity)));
        }
    }
});
