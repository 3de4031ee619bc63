// Copyright 2021 The ChromiumOS Authors
// Copyright 2023 Red Hat, Inc.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::env;

fn main() {
    // The wrapped GBM library path may be baked in at build time.
    println!("cargo:rerun-if-env-changed=DEFAULT_WRAPPED_GBM_LIBRARY");

    // Skip the rest when generating documents.
    if env::var("CARGO_DOC").is_ok() {
        return;
    }

    if let Ok(path) = env::var("DEFAULT_WRAPPED_GBM_LIBRARY") {
        println!("cargo:warning=wrapping GBM library {}", path);
    }
}
