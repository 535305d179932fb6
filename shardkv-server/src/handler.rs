//! Database handler: parses request text, dispatches to the storage façade,
//! and renders a reply string. Every error this returns is forwarded to the
//! client verbatim, so its wording is part of the wire contract.

use crate::parser::{parse, QueryCommand};
use shardkv_storage::Storage;
use std::sync::Arc;

pub const VALUE_NOT_FOUND: &str = "value not found";
pub const OK: &str = "OK";

/// Handles one request's raw text and returns the reply text.
pub async fn handle(storage: &Arc<Storage>, request_text: &str) -> String {
    let query = match parse(request_text) {
        Ok(query) => query,
        Err(err) => return err.to_string(),
    };

    match query.command {
        QueryCommand::Get => match storage.get(&query.args[0]) {
            Some(value) => value,
            None => VALUE_NOT_FOUND.to_string(),
        },
        QueryCommand::Set => {
            let mut args = query.args.into_iter();
            let key = args.next().unwrap();
            let value = args.next().unwrap();
            match storage.set(key, value).await {
                Ok(()) => OK.to_string(),
                Err(err) => err.to_string(),
            }
        }
        QueryCommand::Del => {
            let key = query.args.into_iter().next().unwrap();
            match storage.del(key).await {
                Ok(()) => OK.to_string(),
                Err(err) => err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardkv_core::Engine;
    use shardkv_storage::Role;

    fn storage(role: Role) -> Arc<Storage> {
        Storage::new(Arc::new(Engine::new(8)), None, role)
    }

    #[tokio::test]
    async fn smoke_scenario() {
        let storage = storage(Role::Master);
        assert_eq!(handle(&storage, "SET k v").await, "OK");
        assert_eq!(handle(&storage, "GET k").await, "v");
        assert_eq!(handle(&storage, "DEL k").await, "OK");
        assert_eq!(handle(&storage, "GET k").await, "value not found");
    }

    #[tokio::test]
    async fn role_guard_scenario() {
        let storage = storage(Role::Slave);
        assert_eq!(
            handle(&storage, "SET a b").await,
            "unable to execute set command on slave"
        );
        assert_eq!(handle(&storage, "GET a").await, "value not found");
    }

    #[tokio::test]
    async fn parse_errors_are_forwarded_verbatim() {
        let storage = storage(Role::Standalone);
        assert_eq!(handle(&storage, "").await, "invalid query length (0)");
        assert_eq!(handle(&storage, "foo").await, "invalid command foo");
        assert_eq!(
            handle(&storage, "SET k").await,
            "for command SET expected 2 argument(s), got 1"
        );
    }
}
