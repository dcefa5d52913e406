use std::fmt;

/// Where a hook fired: the job, step, pattern group, pattern key and
/// message sequence it belongs to. Unset parts are omitted when displayed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
  pub job: Option<String>,
  pub step: Option<String>,
  pub group: Option<String>,
  pub pattern: Option<String>,
  pub event_seq: Option<usize>,
}

impl Scope {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn job(&self, job: impl Into<String>) -> Self {
    Self {
      job: Some(job.into()),
      ..self.clone()
    }
  }

  pub fn step(&self, step: impl Into<String>) -> Self {
    Self {
      step: Some(step.into()),
      ..self.clone()
    }
  }

  pub fn group(&self, group: impl Into<String>) -> Self {
    Self {
      group: Some(group.into()),
      ..self.clone()
    }
  }

  pub fn pattern(&self, pattern: impl Into<String>) -> Self {
    Self {
      pattern: Some(pattern.into()),
      ..self.clone()
    }
  }

  pub fn event_seq(&self, seq: usize) -> Self {
    Self {
      event_seq: Some(seq),
      ..self.clone()
    }
  }
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut sep = "";
    if let Some(seq) = self.event_seq {
      write!(f, "{sep}event_seq={seq}")?;
      sep = " ";
    }
    for (name, value) in [
      ("job", &self.job),
      ("step", &self.step),
      ("pattern_group", &self.group),
      ("pattern", &self.pattern),
    ] {
      if let Some(value) = value {
        write!(f, "{sep}{name}={value}")?;
        sep = " ";
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display_skips_unset_parts() {
    let scope = Scope::new().job("j").group("pass").pattern(".v");
    assert_eq!(scope.to_string(), "job=j pattern_group=pass pattern=.v");
  }

  #[test]
  fn test_display_puts_sequence_first() {
    let scope = Scope::new().step("s").event_seq(3);
    assert_eq!(scope.to_string(), "event_seq=3 step=s");
  }

  #[test]
  fn test_builders_do_not_mutate_parent() {
    let parent = Scope::new().job("j");
    let child = parent.step("s");
    assert_eq!(parent.step, None);
    assert_eq!(child.job.as_deref(), Some("j"));
  }
}
