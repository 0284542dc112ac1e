// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::time::Duration;

use spendsync::Error;
use spendsync::gateway::{Gateway, HttpGateway};

#[test]
fn malformed_base_url_is_rejected() {
    let err = HttpGateway::new("not a url", Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn opaque_base_url_fails_before_sending() {
    let gw = HttpGateway::new("mailto:ops@example.com", Duration::from_secs(1)).unwrap();
    assert!(matches!(gw.list_transactions("u-1"), Err(Error::Validation(_))));
}

#[test]
fn unreachable_server_is_a_network_error() {
    let gw = HttpGateway::new("http://127.0.0.1:9/api/", Duration::from_secs(2)).unwrap();
    let err = gw.delete_transaction("tx-1").unwrap_err();
    assert!(err.is_transient());
}
