// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2026 Jonathan D.A. Jewell
#![no_main]

use libfuzzer_sys::fuzz_target;
use org_manager::identity::ExternalIdentity;

fuzz_target!(|data: &str| {
    // Anything that parses must render back to the same string
    if let Ok(id) = ExternalIdentity::parse(data) {
        assert_eq!(id.to_string(), data);
        let again = ExternalIdentity::parse(&id.to_string()).unwrap();
        assert_eq!(again, id);
    }
});
