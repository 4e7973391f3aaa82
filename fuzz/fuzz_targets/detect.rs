#![no_main]

use guestimage::{detect, resolve, ImageFile, ImageKind, LoadContext};
use libfuzzer_sys::fuzz_target;
use strum::IntoEnumIterator;

fuzz_target!(|data: &[u8]| {
    let image = ImageFile::from_mem(data.to_vec());
    let header = image.header();
    let kind = detect(&header);

    for context in LoadContext::iter() {
        if let Ok(addr) = resolve(context, kind, &header, 0x4000_0000, 0x8000_0000) {
            assert_ne!(addr, 0);
            assert!(context.accepts(kind));
        }
    }

    if data.is_empty() {
        assert_eq!(kind, ImageKind::Binary);
    }
});
