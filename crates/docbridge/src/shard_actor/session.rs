//! Session injection for operations that run inside a transaction.
//!
//! Each operation keeps its options document at a fixed argument position. The session is
//! merged into the document at that position, padding the argument list with `Null` when the
//! caller left trailing options out.
//!
//! Operations without a known position (`deleteMany` and every database operation) fall back to
//! merging into the last argument when it is a document, else appending `{session}`. For
//! `deleteMany(filter)` this merges the session into the *filter*; callers that need a
//! transactional `deleteMany` pass an explicit options document so the last argument is the
//! options. The fallback logs a warning each time it is taken.

use crate::model::{Bson, Document};
use crate::protocol::Operation;
use crate::store::{Session, SESSION_KEY};
use tracing::warn;

/// Argument position of the options document, when the operation has a known one.
pub fn options_slot(operation: Operation) -> Option<usize> {
    match operation {
        Operation::FindOne
        | Operation::Find
        | Operation::InsertOne
        | Operation::InsertMany
        | Operation::DeleteOne
        | Operation::FindOneAndDelete
        | Operation::CountDocuments
        | Operation::Aggregate => Some(1),
        Operation::UpdateOne
        | Operation::UpdateMany
        | Operation::FindOneAndUpdate
        | Operation::FindOneAndReplace
        | Operation::Distinct => Some(2),
        Operation::DeleteMany
        | Operation::ListCollections
        | Operation::CreateCollection
        | Operation::DropCollection
        | Operation::DropDatabase
        | Operation::RenameCollection
        | Operation::Stats => None,
    }
}

/// Returns `args` with the session placed where `operation` reads its options.
pub fn prepare_args_with_session(
    mut args: Vec<Bson>,
    operation: Operation,
    session: Session,
) -> Vec<Bson> {
    match options_slot(operation) {
        Some(slot) => {
            if args.len() <= slot {
                args.resize(slot + 1, Bson::Null);
            }
            merge_session(&mut args[slot], session);
        }
        None => {
            warn!(
                %operation,
                arguments = args.len(),
                "No options position known, merging session into trailing argument"
            );
            if let Some(Bson::Document(options)) = args.last_mut() {
                options.insert(SESSION_KEY, session.to_value());
            } else {
                args.push(session_options(session).into());
            }
        }
    }
    args
}

fn merge_session(slot: &mut Bson, session: Session) {
    match slot {
        Bson::Document(options) => {
            options.insert(SESSION_KEY, session.to_value());
        }
        other => *other = session_options(session).into(),
    }
}

fn session_options(session: Session) -> Document {
    let mut options = Document::new();
    options.insert(SESSION_KEY, session.to_value());
    options
}
