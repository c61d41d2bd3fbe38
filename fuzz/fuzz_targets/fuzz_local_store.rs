// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2026 Jonathan D.A. Jewell
#![no_main]

use libfuzzer_sys::fuzz_target;
use org_manager::local::LocalStore;

fuzz_target!(|data: &[u8]| {
    // Arbitrary store files must be rejected or checked, never panic
    if let Ok(store) = serde_json::from_slice::<LocalStore>(data) {
        let _ = store.check_hierarchy();
    }
});
