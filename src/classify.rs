//! Identifier classification.
//!
//! Pure predicates over raw text typed in chat, clicked in rendered content
//! or passed as link parameters. Nothing here touches the network.

use crate::error::ResolutionError;
use crate::types::EntityReference;

const MAX_ACCOUNT_NAME_LEN: usize = 13;
const TX_ID_LEN: usize = 64;

/// 1-13 characters of `a-z`, `1-5` and `.`, not starting or ending with a dot.
pub fn is_account_name(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_ACCOUNT_NAME_LEN {
        return false;
    }
    if !bytes
        .iter()
        .all(|b| matches!(b, b'a'..=b'z' | b'1'..=b'5' | b'.'))
    {
        return false;
    }
    bytes[0] != b'.' && bytes[bytes.len() - 1] != b'.'
}

/// Exactly 64 lowercase hex characters.
pub fn is_transaction_id(text: &str) -> bool {
    text.len() == TX_ID_LEN
        && text
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// `"alice@active"` -> `"alice"`. Input without `@` is returned unchanged.
pub fn strip_permission_suffix(text: &str) -> &str {
    match text.find('@') {
        Some(idx) => &text[..idx],
        None => text,
    }
}

/// Block height, or a 64-hex block id.
pub fn is_block_id(text: &str) -> bool {
    is_block_number(text) || is_transaction_id(text)
}

fn is_block_number(text: &str) -> bool {
    !text.is_empty() && text.len() <= 20 && text.bytes().all(|b| b.is_ascii_digit())
}

/// Turn free text from the chat box into a reference.
pub fn classify_query(text: &str) -> Result<EntityReference, ResolutionError> {
    let trimmed = text.trim();
    if is_transaction_id(trimmed) {
        return Ok(EntityReference::Transaction {
            id: trimmed.to_string(),
        });
    }
    if is_block_number(trimmed) {
        return Ok(EntityReference::Block {
            id_or_number: trimmed.to_string(),
        });
    }
    let name = strip_permission_suffix(trimmed);
    if is_account_name(name) {
        return Ok(EntityReference::account(name));
    }
    Err(ResolutionError::MalformedIdentifier(trimmed.to_string()))
}

/// Rejects a reference whose identifiers cannot be valid before any
/// request is built from it.
pub fn validate_reference(reference: &EntityReference) -> Result<(), ResolutionError> {
    let malformed = |s: &str| Err(ResolutionError::MalformedIdentifier(s.to_string()));
    match reference {
        EntityReference::Account { name } => {
            if !is_account_name(strip_permission_suffix(name)) {
                return malformed(name);
            }
        }
        EntityReference::Block { id_or_number } => {
            if !is_block_id(id_or_number.trim()) {
                return malformed(id_or_number);
            }
        }
        EntityReference::Transaction { id } => {
            if !is_transaction_id(id.trim()) {
                return malformed(id);
            }
        }
        EntityReference::TableQuery(query) => {
            if !is_account_name(&query.code) {
                return malformed(&query.code);
            }
            if !is_account_name(&query.table) {
                return malformed(&query.table);
            }
        }
        EntityReference::ActionSchema {
            code, action_name, ..
        } => {
            if !is_account_name(code) {
                return malformed(code);
            }
            if !is_account_name(action_name) {
                return malformed(action_name);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TableQuery;

    #[test]
    fn account_names() {
        for ok in ["a", "alice", "eosio.token", "a1b2c3d4e5.zz", "1", "z.z"] {
            assert!(is_account_name(ok), "{ok} should be an account name");
        }
        for bad in [
            "",
            ".",
            ".alice",
            "alice.",
            "Alice",
            "alice6",
            "alice0",
            "alice-bob",
            "abcdefghijklmn",
            "alice@active",
        ] {
            assert!(!is_account_name(bad), "{bad} should not be an account name");
        }
    }

    #[test]
    fn thirteen_chars_is_the_limit() {
        assert!(is_account_name("abcdefghijklm"));
        assert!(!is_account_name("abcdefghijklmn"));
    }

    #[test]
    fn transaction_ids() {
        let id = "a".repeat(64);
        assert!(is_transaction_id(&id));
        assert!(is_transaction_id(
            "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
        ));
        assert!(!is_transaction_id(&"a".repeat(63)));
        assert!(!is_transaction_id(&"a".repeat(65)));
        assert!(!is_transaction_id(&"A".repeat(64)));
        assert!(!is_transaction_id(&"g".repeat(64)));
    }

    #[test]
    fn permission_suffix() {
        assert_eq!(strip_permission_suffix("alice@active"), "alice");
        assert_eq!(strip_permission_suffix("alice"), "alice");
        assert_eq!(strip_permission_suffix("alice@owner@x"), "alice");
        assert_eq!(strip_permission_suffix("@active"), "");
    }

    #[test]
    fn classify_free_text() {
        assert_eq!(
            classify_query(" alice@active ").unwrap(),
            EntityReference::account("alice")
        );
        assert_eq!(
            classify_query("123456").unwrap(),
            EntityReference::Block {
                id_or_number: "123456".into()
            }
        );
        let tx = "f".repeat(64);
        assert_eq!(
            classify_query(&tx).unwrap(),
            EntityReference::Transaction { id: tx.clone() }
        );
        assert!(matches!(
            classify_query("Not An Account"),
            Err(ResolutionError::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_table_and_tx() {
        let bad_table = EntityReference::TableQuery(TableQuery::new("eosio.token", "Accounts"));
        assert!(validate_reference(&bad_table).is_err());
        let good_table = EntityReference::TableQuery(TableQuery::new("eosio.token", "accounts"));
        assert!(validate_reference(&good_table).is_ok());
        let bad_tx = EntityReference::Transaction { id: "abc".into() };
        assert!(validate_reference(&bad_tx).is_err());
        assert!(validate_reference(&EntityReference::account("alice@active")).is_ok());
    }
}
