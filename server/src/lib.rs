//! Realm world server: creature lifecycle and path movement.

pub mod ai;
pub mod commands;
pub mod config;
pub mod entities;
pub mod movement;
pub mod paths;
pub mod persistence;
pub mod world;
