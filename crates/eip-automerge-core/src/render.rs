//! Text the bot writes back to the pull request: the squash commit and the
//! failure comment.

use crate::domain::EipNumber;

/// Body of every automerge squash commit.
pub const MERGE_MESSAGE: &str = "Hi, I'm a bot! This change was automatically merged because:
 - It only modifies existing Draft, Review, or Last Call EIP(s)
 - The PR was approved or written by at least one author of each modified EIP
 - The build is passing";

/// First line of the bot's failure comment; also identifies the comment.
pub const COMMENT_PREAMBLE: &str =
    "Hi! I'm a bot, and I wanted to automerge your PR, but couldn't because of the following issue(s):";

/// Squash commit title, e.g. `Automatically merged updates to draft EIP(s) 1, 55 (#123)`.
pub fn commit_title(numbers: &[EipNumber], pr_number: u64) -> String {
    let list: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
    format!(
        "Automatically merged updates to draft EIP(s) {} (#{})",
        list.join(", "),
        pr_number
    )
}

/// Failure comment: the preamble, a blank line, then one ` - ` line per error.
pub fn comment_body(errors: &[String]) -> String {
    let mut out = String::from(COMMENT_PREAMBLE);
    out.push_str("\n\n");
    for error in errors {
        out.push_str(&format!(" - {}\n", error));
    }
    out
}

/// Whether `body` is a comment this bot wrote.
pub fn is_bot_comment(body: &str) -> bool {
    body.starts_with(COMMENT_PREAMBLE)
}
