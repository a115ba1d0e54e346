// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod error;
pub mod models;
pub mod db;
pub mod store;
pub mod projection;
pub mod reconcile;
pub mod aggregate;
pub mod ledger;
pub mod suggest;
pub mod receipts;
pub mod cards;
pub mod bills;
pub mod statements;
pub mod selic;
pub mod config;
pub mod cli;
pub mod utils;
pub mod commands;
