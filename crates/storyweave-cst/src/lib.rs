// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! A position-indexed parser for story component files and lowered modules.
//!
//! # Overview
//!
//! - **Parsing**: [`parse_component`] parses a component file into markup
//!   nodes plus its module script; [`parse_module`] parses a whole script
//!   buffer such as the output of a lowering step.
//! - **Spans**: every node carries `[start, end)` byte offsets into the
//!   buffer it was parsed from, whichever tree it belongs to.
//! - **Code Generation**: touched expressions are re-rendered with the
//!   [`Codegen`] trait; untouched ones print as their source slice.
//!
//! # Quick Start
//!
//! ```
//! use storyweave_cst::{parse_module, print_expr};
//!
//! let source = "const { Story } = defineMeta({ title: 'Button' });";
//! let module = parse_module(source).expect("parse error");
//! let decl = module.body[0].as_var_decl().unwrap();
//! let init = decl.declarators[0].init.as_ref().unwrap();
//! assert_eq!(print_expr(init, source), "defineMeta({ title: 'Button' })");
//! ```

pub mod nodes;
pub mod parser;
pub mod printer;
pub mod tokenizer;
pub mod visitor;

pub use nodes::*;
pub use parser::{
    parse_component, parse_expression_at, parse_expression_range, parse_module, parse_program,
    unescape_string, ParseError, ParseResult,
};
pub use printer::{print_expr, quote_string, Codegen, CodegenState};
pub use storyweave_core::patch::Span;
pub use visitor::{
    callee_name, walk_fragment, walk_function_node, CallSiteCollector, MarkupVisitor, VisitResult,
    Visitor,
};
