#![cfg_attr(not(test), no_std)]

//! Synchronisation primitives shared between the firmware tasks.

pub mod mailbox;
