//! Explicit configuration handed to a run.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::DuplicatePolicy;
use crate::error::PreconditionError;

/// Page size used when reading the mapping table.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Target width:height ratio for the image strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatio {
  pub width: f64,
  pub height: f64,
}

impl AspectRatio {
  pub fn new(width: f64, height: f64) -> Self {
    Self { width, height }
  }

  pub fn is_valid(&self) -> bool {
    self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
  }

  pub fn value(&self) -> f64 {
    self.width / self.height
  }
}

impl fmt::Display for AspectRatio {
  /// `1x1`, `16x9`, `1.5x1`: integral parts print without a fractional suffix.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

impl FromStr for AspectRatio {
  type Err = String;

  /// Parses `W:H` or `WxH`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (w, h) = s
      .split_once(':')
      .or_else(|| s.split_once(['x', 'X']))
      .ok_or_else(|| format!("expected W:H, got {:?}", s))?;
    let width: f64 = w.trim().parse().map_err(|_| format!("bad width {:?}", w))?;
    let height: f64 = h.trim().parse().map_err(|_| format!("bad height {:?}", h))?;
    let ratio = AspectRatio::new(width, height);
    if !ratio.is_valid() {
      return Err(format!("ratio must be positive, got {}:{}", width, height));
    }
    Ok(ratio)
  }
}

/// Where the name → user mapping comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingConfig {
  pub table_id: String,
  pub name_field_id: String,
  pub user_field_id: String,
  pub page_size: usize,
  pub duplicate_policy: DuplicatePolicy,
}

impl MappingConfig {
  pub fn new(
    table_id: impl Into<String>,
    name_field_id: impl Into<String>,
    user_field_id: impl Into<String>,
  ) -> Self {
    Self {
      table_id: table_id.into(),
      name_field_id: name_field_id.into(),
      user_field_id: user_field_id.into(),
      page_size: DEFAULT_PAGE_SIZE,
      duplicate_policy: DuplicatePolicy::default(),
    }
  }
}

/// Which transform runs per record.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
  ImageRatio { ratio: AspectRatio },
  NameResolution { mapping: MappingConfig },
}

impl StrategyConfig {
  pub fn name(&self) -> &'static str {
    match self {
      StrategyConfig::ImageRatio { .. } => "image_ratio",
      StrategyConfig::NameResolution { .. } => "name_resolution",
    }
  }
}

/// Everything a run needs, passed once into the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
  pub table_id: String,
  pub source_field_id: String,
  pub target_field_id: String,
  pub strategy: StrategyConfig,
  /// Upper bound for each remote call; `None` waits indefinitely.
  pub call_timeout: Option<Duration>,
}

impl RunConfig {
  pub fn new(
    table_id: impl Into<String>,
    source_field_id: impl Into<String>,
    target_field_id: impl Into<String>,
    strategy: StrategyConfig,
  ) -> Self {
    Self {
      table_id: table_id.into(),
      source_field_id: source_field_id.into(),
      target_field_id: target_field_id.into(),
      strategy,
      call_timeout: None,
    }
  }

  pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
    self.call_timeout = Some(timeout);
    self
  }

  /// Checks every selector is present and the strategy parameters are usable.
  pub fn validate(&self) -> Result<(), PreconditionError> {
    require(&self.table_id, "table")?;
    require(&self.source_field_id, "source field")?;
    require(&self.target_field_id, "target field")?;
    match &self.strategy {
      StrategyConfig::ImageRatio { ratio } => {
        if !ratio.is_valid() {
          return Err(PreconditionError::InvalidRatio {
            width: ratio.width,
            height: ratio.height,
          });
        }
      }
      StrategyConfig::NameResolution { mapping } => {
        require(&mapping.table_id, "mapping table")?;
        require(&mapping.name_field_id, "mapping name field")?;
        require(&mapping.user_field_id, "mapping user field")?;
      }
    }
    Ok(())
  }
}

fn require(value: &str, what: &'static str) -> Result<(), PreconditionError> {
  if value.trim().is_empty() {
    Err(PreconditionError::MissingSelection(what))
  } else {
    Ok(())
  }
}
