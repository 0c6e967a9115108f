use super::{Enumerated, LinkProvider};
use crate::config::FrontpageConfig;
use crate::core::{ChangeFreq, FRONTPAGE_TYPE, InfrastructureError, Link, LinkExtension, Priority};

const SOURCE_ID: &str = "frontpage";

/// The site root, always a single link.
pub struct FrontpageProvider {
    priority: Priority,
    changefreq: ChangeFreq,
}

impl FrontpageProvider {
    pub fn new(priority: Priority, changefreq: ChangeFreq) -> Self {
        Self {
            priority,
            changefreq,
        }
    }

    pub fn from_config(config: &FrontpageConfig) -> Self {
        // Out-of-range values are rejected by config validation
        Self::new(
            Priority::new(config.priority).unwrap_or(Priority::DEFAULT),
            config.changefreq,
        )
    }
}

impl LinkProvider for FrontpageProvider {
    fn link_type(&self) -> &str {
        FRONTPAGE_TYPE
    }

    fn count(&self) -> Result<u64, InfrastructureError> {
        Ok(1)
    }

    fn enumerate(&self, offset: u64, limit: usize) -> Result<Vec<Enumerated>, InfrastructureError> {
        if offset > 0 || limit == 0 {
            return Ok(Vec::new());
        }
        let link = Link::new(FRONTPAGE_TYPE, SOURCE_ID, "/")
            .with_priority(self.priority)
            .with_changefreq(self.changefreq)
            .with_extension(LinkExtension::Frontpage);
        Ok(vec![Ok(link)])
    }
}
