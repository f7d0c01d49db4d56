// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    zero          = { 0, "0s" },
    seconds       = { 59, "59s" },
    one_minute    = { 60, "1m" },
    minutes       = { 3599, "59m" },
    one_hour      = { 3600, "1h" },
    hours         = { 86_399, "23h" },
    one_day       = { 86_400, "1d" },
    many_days     = { 864_000, "10d" },
)]
fn formats_single_unit(secs: u64, expected: &str) {
    assert_eq!(format_elapsed(secs), expected);
}

#[test]
fn millis_truncate_to_seconds() {
    assert_eq!(format_elapsed_ms(1_999), "1s");
    assert_eq!(format_elapsed_ms(120_000), "2m");
}
