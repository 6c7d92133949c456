//! Slash-command parsing and resource-reference extraction.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
/// Form fields Slack posts to the command endpoint. Only the fields the
/// sign-in flow needs are modeled; the rest of the payload is ignored.
pub struct SlashCommandPayload {
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    pub trigger_id: String,
    #[serde(default)]
    pub response_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A GitHub repository or account reference named by a command.
pub struct RepoRef {
    pub owner: String,
    pub name: Option<String>,
}

impl RepoRef {
    pub fn full_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{}/{}", self.owner, name),
            None => self.owner.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An issue named by URL, e.g. `https://github.com/owner/repo/issues/123`.
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
    SignIn,
    Subscribe(RepoRef),
    Unsubscribe(RepoRef),
    Close(IssueRef),
    Reopen(IssueRef),
    Unknown,
}

impl CommandAction {
    /// The external resource the command acts on, when it names one. Drives
    /// installation resolution; `SignIn` never has a resource.
    pub fn resource_reference(&self) -> Option<RepoRef> {
        match self {
            Self::Subscribe(repo) | Self::Unsubscribe(repo) => Some(repo.clone()),
            Self::Close(issue) | Self::Reopen(issue) => Some(RepoRef {
                owner: issue.owner.clone(),
                name: Some(issue.repo.clone()),
            }),
            Self::SignIn | Self::Unknown => None,
        }
    }

    /// Whether the command should be cached for replay after sign-in. A bare
    /// `signin` has nothing to replay; unrecognized text is not replayed
    /// either.
    pub fn should_replay(&self) -> bool {
        !matches!(self, Self::SignIn | Self::Unknown)
    }
}

/// Parses the free-form command text into an action.
pub fn parse_command_action(text: &str) -> CommandAction {
    let trimmed = text.trim();
    let mut pieces = trimmed.splitn(2, char::is_whitespace);
    let verb = pieces.next().unwrap_or_default();
    let remainder = pieces.next().unwrap_or_default().trim();
    match verb {
        "signin" if remainder.is_empty() => CommandAction::SignIn,
        "subscribe" => parse_repo_ref(remainder)
            .map(CommandAction::Subscribe)
            .unwrap_or(CommandAction::Unknown),
        "unsubscribe" => parse_repo_ref(remainder)
            .map(CommandAction::Unsubscribe)
            .unwrap_or(CommandAction::Unknown),
        "close" => parse_issue_ref(remainder)
            .map(CommandAction::Close)
            .unwrap_or(CommandAction::Unknown),
        "reopen" => parse_issue_ref(remainder)
            .map(CommandAction::Reopen)
            .unwrap_or(CommandAction::Unknown),
        _ => CommandAction::Unknown,
    }
}

fn parse_repo_ref(raw: &str) -> Option<RepoRef> {
    if raw.is_empty() || raw.contains(char::is_whitespace) {
        return None;
    }
    let mut pieces = raw.splitn(2, '/');
    let owner = pieces.next().filter(|owner| !owner.is_empty())?;
    let name = pieces.next();
    if matches!(name, Some("")) {
        return None;
    }
    Some(RepoRef {
        owner: owner.to_string(),
        name: name.map(|name| name.to_string()),
    })
}

fn parse_issue_ref(raw: &str) -> Option<IssueRef> {
    let path = raw
        .strip_prefix("https://github.com/")
        .or_else(|| raw.strip_prefix("http://github.com/"))?;
    let mut pieces = path.split('/');
    let owner = pieces.next().filter(|piece| !piece.is_empty())?;
    let repo = pieces.next().filter(|piece| !piece.is_empty())?;
    if pieces.next() != Some("issues") {
        return None;
    }
    let number = pieces.next()?.parse::<u64>().ok()?;
    if pieces.next().is_some() {
        return None;
    }
    Some(IssueRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
        number,
    })
}
