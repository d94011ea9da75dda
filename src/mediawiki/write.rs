//! Action API write path: login, tokens, page edit and delete
//!
//! The client performs no session management of its own. `login`
//! stores the session cookies in the HTTP client's jar, so write calls
//! made through the same client act as the logged-in user; the caller
//! owns the client and with it the session. Tokens are fetched by the
//! caller and passed into every write call.

use super::ActionApiClient;
use crate::error::{Error, Result};
use serde_json::Value;

/// New page content or a change to an existing page.
#[derive(Clone, Debug, Default)]
pub struct EditPage {
    pub title: String,
    /// Full replacement wikitext of the page.
    pub text: String,
    pub summary: Option<String>,
    /// Fail with an API error instead of overwriting when the page
    /// already exists.
    pub create_only: bool,
    pub minor: bool,
    pub bot: bool,
}

/// Outcome of a successful edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditResult {
    pub title: String,
    pub page_id: Option<u64>,
    pub new_revision: Option<u64>,
    /// True when the API reported the edit changed nothing.
    pub no_change: bool,
}

impl ActionApiClient {
    /// Token for `action=login`.
    pub fn login_token(&self) -> Result<String> {
        let j = self.get(&[
            ("format", "json"),
            ("formatversion", "2"),
            ("action", "query"),
            ("meta", "tokens"),
            ("type", "login"),
        ])?;
        token_from(&j, "logintoken")
    }

    /// Log in with a bot password. On success the session cookies stay
    /// on this client; subsequent [`csrf_token`](Self::csrf_token) and
    /// write calls run as this user.
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(Error::Auth("Missing username or password".to_string()));
        }
        let token = self.login_token()?;
        let j = self.post(&[
            ("format", "json"),
            ("formatversion", "2"),
            ("action", "login"),
            ("lgname", username),
            ("lgpassword", password),
            ("lgtoken", &token),
        ])?;
        let login = j.get("login").unwrap_or(&Value::Null);
        match login.get("result").and_then(Value::as_str) {
            Some("Success") => Ok(login
                .get("lgusername")
                .and_then(Value::as_str)
                .unwrap_or(username)
                .to_string()),
            Some(result) => {
                let reason = login
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or(result);
                Err(Error::Auth(format!("Login failed: {}", reason)))
            }
            None => Err(Error::Parse("Login response without result".to_string())),
        }
    }

    /// CSRF token of the current session. Anonymous sessions get the
    /// constant `+\` token, which the write operations reject.
    pub fn csrf_token(&self) -> Result<String> {
        let j = self.get(&[
            ("format", "json"),
            ("formatversion", "2"),
            ("action", "query"),
            ("meta", "tokens"),
        ])?;
        token_from(&j, "csrftoken")
    }

    /// Create or replace a page. `token` is a CSRF token from
    /// [`csrf_token`](Self::csrf_token); an empty or anonymous token
    /// fails locally, nothing is sent.
    pub fn edit_page(&self, edit: &EditPage, token: &str) -> Result<EditResult> {
        check_token(token)?;
        if edit.title.trim().is_empty() {
            return Err(Error::InvalidInput("Empty page title".to_string()));
        }
        let mut params: Vec<(&str, &str)> = vec![
            ("format", "json"),
            ("formatversion", "2"),
            ("action", "edit"),
            ("title", &edit.title),
            ("text", &edit.text),
        ];
        if let Some(summary) = &edit.summary {
            params.push(("summary", summary));
        }
        if edit.create_only {
            params.push(("createonly", "1"));
        }
        if edit.minor {
            params.push(("minor", "1"));
        }
        if edit.bot {
            params.push(("bot", "1"));
        }
        // The token must be the last parameter so a truncated request
        // cannot carry a valid one
        params.push(("token", token));
        let j = self.post(&params)?;
        let edit = j.get("edit").unwrap_or(&Value::Null);
        match edit.get("result").and_then(Value::as_str) {
            Some("Success") => Ok(EditResult {
                title: edit
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                page_id: edit.get("pageid").and_then(Value::as_u64),
                new_revision: edit.get("newrevid").and_then(Value::as_u64),
                no_change: edit.get("nochange").is_some(),
            }),
            Some(result) => Err(Error::Api {
                code: result.to_string(),
                info: edit.to_string(),
            }),
            None => Err(Error::Parse("Edit response without result".to_string())),
        }
    }

    /// Delete a page. Requires a CSRF token of a session with the
    /// delete right; same local token check as [`edit_page`](Self::edit_page).
    pub fn delete_page(&self, title: &str, reason: Option<&str>, token: &str) -> Result<()> {
        check_token(token)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("Empty page title".to_string()));
        }
        let mut params: Vec<(&str, &str)> = vec![
            ("format", "json"),
            ("formatversion", "2"),
            ("action", "delete"),
            ("title", title),
        ];
        if let Some(reason) = reason {
            params.push(("reason", reason));
        }
        params.push(("token", token));
        let j = self.post(&params)?;
        if j.get("delete").is_none() {
            return Err(Error::Parse("Delete response without result".to_string()));
        }
        Ok(())
    }
}

fn token_from(j: &Value, name: &str) -> Result<String> {
    j.pointer(&format!("/query/tokens/{}", name))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Parse(format!("No {} in token response", name)))
}

/// Reject tokens that cannot possibly authorize a write: empty strings
/// and the anonymous-session token.
fn check_token(token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::Auth("Empty edit token".to_string()));
    }
    if token == r"+\" {
        return Err(Error::Auth("Anonymous session token".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_token() {
        assert!(check_token("").is_err());
        assert!(check_token("   ").is_err());
        assert!(check_token(r"+\").is_err());
        assert!(check_token("0123456789abcdef+\\").is_ok());
    }

    #[test]
    fn test_edit_with_empty_token_is_auth_error() {
        let client = ActionApiClient::new("test.wikipedia.org");
        let edit = EditPage {
            title: "Sandbox".to_string(),
            text: "content".to_string(),
            ..Default::default()
        };
        assert!(matches!(client.edit_page(&edit, ""), Err(Error::Auth(_))));
        assert!(matches!(
            client.delete_page("Sandbox", None, r"+\"),
            Err(Error::Auth(_))
        ));
    }

    #[test]
    fn test_token_from() {
        let j = json!({"query": {"tokens": {"csrftoken": "abc+\\"}}});
        assert_eq!(token_from(&j, "csrftoken").unwrap(), "abc+\\");
        assert!(token_from(&j, "logintoken").is_err());
        assert!(token_from(&json!({}), "csrftoken").is_err());
    }
}
