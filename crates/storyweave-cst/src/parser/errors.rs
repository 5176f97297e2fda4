// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use storyweave_core::error::StoryweaveError;
use storyweave_core::text::byte_offset_to_position;
use thiserror::Error;

use crate::tokenizer::TokError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] TokError),
    #[error("unexpected {found}, expected {expected}")]
    Unexpected {
        offset: usize,
        found: String,
        expected: String,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { offset: usize, expected: String },
    #[error("closing tag </{found}> does not match <{expected}>")]
    MismatchedTag {
        offset: usize,
        found: String,
        expected: String,
    },
    #[error("<{name}> is never closed")]
    UnclosedElement { offset: usize, name: String },
    #[error("{{#{kind}}} block is never closed")]
    UnclosedBlock { offset: usize, kind: String },
}

impl ParseError {
    /// Byte offset the error points at.
    pub fn offset(&self) -> usize {
        match self {
            ParseError::Tokenizer(err) => err.offset(),
            ParseError::Unexpected { offset, .. }
            | ParseError::UnexpectedEof { offset, .. }
            | ParseError::MismatchedTag { offset, .. }
            | ParseError::UnclosedElement { offset, .. }
            | ParseError::UnclosedBlock { offset, .. } => *offset,
        }
    }

    /// Convert into a syntax error positioned in `src`.
    pub fn into_error(self, file: &str, src: &str) -> StoryweaveError {
        let (line, col) = byte_offset_to_position(src, self.offset());
        StoryweaveError::Syntax {
            file: file.to_string(),
            line,
            col,
            message: self.to_string(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
