/// Command detection: identify prefixed commands in inbound text.
use crate::types::CommandInvocation;

/// Split a message into a command invocation.
///
/// Returns `None` when `text` does not start with `prefix`. The remainder is
/// split on single spaces: token 0 is the command (lowercased for lookup),
/// the rest are passed through verbatim, empty tokens included.
pub fn detect_command(text: &str, prefix: &str) -> Option<CommandInvocation> {
    let body = text.strip_prefix(prefix)?;

    let mut tokens = body.split(' ');
    let raw_name = tokens.next().unwrap_or_default().to_string();
    let args = tokens.map(str::to_string).collect();

    Some(CommandInvocation {
        name: raw_name.to_lowercase(),
        raw_name,
        args,
    })
}
