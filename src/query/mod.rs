//! Boolean queries over posting lists.
//!
//! A [`Query`] is a tree of trigram lookups joined by `And`/`Or`. Evaluation
//! yields a sorted, duplicate-free list of document ids; [`planner`] turns a
//! literal search string into such a tree.

pub mod planner;
pub mod sorted;

pub use planner::{fold_char, plan_literal, LiteralPlan, ShortPattern};
pub use sorted::{intersect, union, SetFolder};

use crate::error::Result;
use crate::index::types::{DocId, Trigram};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// Documents whose key set contains the trigram
    Contains(Trigram),
    And(Vec<Query>),
    Or(Vec<Query>),
}

/// Anything that can hand out the sorted posting list of a trigram.
/// An absent trigram is an empty list, not an error.
pub trait PostingSource {
    fn postings(&self, trigram: Trigram) -> Result<Vec<DocId>>;
}

impl Query {
    /// Evaluate to sorted doc ids. `And([])` and `Or([])` are both empty.
    pub fn evaluate<S: PostingSource + ?Sized>(&self, source: &S) -> Result<Vec<DocId>> {
        match self {
            Query::Contains(trigram) => source.postings(*trigram),
            Query::And(operands) => {
                let mut operands = operands.iter();
                let Some(first) = operands.next() else {
                    return Ok(Vec::new());
                };
                let mut folder = SetFolder::new(first.evaluate(source)?);
                for operand in operands {
                    if folder.is_empty() {
                        break;
                    }
                    let next = operand.evaluate(source)?;
                    folder.intersect(&next);
                }
                Ok(folder.finish())
            }
            Query::Or(operands) => {
                let mut folder = SetFolder::new(Vec::new());
                for operand in operands {
                    let next = operand.evaluate(source)?;
                    folder.union(&next);
                }
                Ok(folder.finish())
            }
        }
    }
}
