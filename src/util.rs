//! Small utility helpers used across modules.

use std::{borrow::Cow, future::Future, time::Duration};

use tokio::time::Instant;

use crate::error::ApiError;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values in a
/// single left-to-right pass; inserted values are never scanned again.
/// Unknown placeholders are left as they are.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let tail = &rest[open + 1..];
    let hit = pairs.iter().find(|(k, _)| {
      tail.strip_prefix(*k).map_or(false, |after| after.starts_with('}'))
    });
    match hit {
      Some((k, v)) => {
        out.push_str(v);
        rest = &tail[k.len() + 1..];
      }
      None => {
        out.push('{');
        rest = tail;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Cut `s` to at most `max` characters on a char boundary.
/// Returns the input untouched when it already fits.
pub fn truncate_chars(s: &str, max: usize) -> Cow<'_, str> {
  match s.char_indices().nth(max) {
    Some((idx, _)) => Cow::Owned(s[..idx].to_string()),
    None => Cow::Borrowed(s),
  }
}

/// Log-safe preview of model output.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  match truncate_chars(s, max) {
    Cow::Borrowed(b) => b.to_string(),
    Cow::Owned(o) => format!("{}… ({} bytes total)", o, s.len()),
  }
}

/// Per-request deadline threaded through the pipeline.
///
/// Each collaborator call runs under `run`; when the deadline passes, the
/// in-flight future is dropped, which cancels its HTTP exchange.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
  at: Instant,
}

impl Deadline {
  pub fn after(budget: Duration) -> Self {
    Self { at: Instant::now() + budget }
  }

  pub fn remaining(&self) -> Duration {
    self.at.saturating_duration_since(Instant::now())
  }

  pub async fn run<T, F>(&self, stage: &'static str, fut: F) -> Result<T, ApiError>
  where
    F: Future<Output = Result<T, ApiError>>,
  {
    match tokio::time::timeout_at(self.at, fut).await {
      Ok(res) => res,
      Err(_) => Err(ApiError::Timeout { stage }),
    }
  }
}
