// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Visitor infrastructure for script and markup traversal.
//!
//! # Traversal Order
//!
//! - **Depth-first, pre-order** for `visit_*` methods
//! - **Post-order** for `leave_*` methods
//! - Children are visited in source order
//!
//! ```ignore
//! use storyweave_cst::visitor::{Visitor, VisitResult};
//!
//! struct CallCounter {
//!     count: usize,
//! }
//!
//! impl<'a> Visitor<'a> for CallCounter {
//!     fn visit_call(&mut self, _node: &'a CallExpr) -> VisitResult {
//!         self.count += 1;
//!         VisitResult::Continue
//!     }
//! }
//! ```

mod call_site;
mod dispatch;
mod traits;

pub use call_site::{callee_name, CallSiteCollector};
pub use dispatch::{walk_fragment, walk_function_node};
pub use traits::{MarkupVisitor, VisitResult, Visitor};
