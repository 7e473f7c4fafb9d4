// Copyright 2025 dotbridge contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # dotbridge
//!
//! Type-graph resolution and emission planning for translating a managed-runtime (.NET-style)
//! type model into ABI-faithful C++ interop headers.
//!
//! `dotbridge` is the planning core of a code generator: given an already-parsed type model
//! (classes, structs, interfaces, enums, with fields, methods, generics, nesting and
//! inheritance), it decides for every type reference whether the consumer needs a full
//! definition or a forward declaration, where that definition must physically live (same
//! file, included file, or in-place nested block), how generic parameters propagate through
//! chains of nested generic declaring types, how to avoid duplicate bases when interface
//! hierarchies overlap, and what binary size a value type occupies. The textual writer,
//! metadata reader and CLI live outside this crate.
//!
//! ## Quick Start
//!
//! ```rust
//! use dotbridge::prelude::*;
//!
//! let mut registry = TypeRegistry::new();
//! registry.insert(TypeBuilder::class(TypeIdentity::plain("System", "Object")).build())?;
//! registry.insert(
//!     TypeBuilder::class(TypeIdentity::plain("Game", "Player"))
//!         .parent(TypeIdentity::plain("System", "Object"))
//!         .field("health", TypeIdentity::plain("System", "Int32"), 0x10)
//!         .build(),
//! )?;
//!
//! let mut graph = ContextGraph::build(&registry, EmitConfig::default())?;
//! let mut planner = Planner::new();
//! let plans = planner.resolve_all(&mut graph)?;
//! assert_eq!(plans.len(), 2);
//! # Ok::<(), dotbridge::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`model`] - the immutable type model: identities, resolved definitions and the registry
//! - [`layout`] - binary size inference from field offsets and parent layout
//! - [`emission`] - per-type emission contexts, name resolution and the file planner
//! - [`Error`] and [`Result`] - error handling for the whole crate
//!
//! Planning is a strictly ordered, single-threaded pass over an immutable registry; only the
//! size and interface-uniqueness memos are shared across threads.

pub mod emission;
pub mod layout;
pub mod model;
pub mod prelude;

mod error;

pub use error::Error;

/// Result alias using this crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
