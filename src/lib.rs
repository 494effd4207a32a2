#![doc = include_str!("../README.md")]
#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
#![allow(clippy::match_like_matches_macro, clippy::derive_partial_eq_without_eq)]

mod client;
pub mod error;
mod operation;
mod sdam;
mod selection_criteria;
#[cfg(test)]
mod test;

pub use crate::{
    client::{
        session::{ClientSession, SessionOptions, Transaction, TransactionState, UnpinMode},
        Client,
    },
    operation::{Aspect, AspectSet, ExecutionContext, Operation, OperationWithDefaults},
    sdam::{
        SelectedServer,
        ServerAddress,
        ServerDescription,
        ServerType,
        SessionSupportStatus,
        Topology,
    },
    selection_criteria::{ReadPreference, ReadPreferenceOptions, SelectionCriteria, TagSet},
};

/// A boxed future.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
