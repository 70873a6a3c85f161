use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub per_second: u64,
    pub burst_size: u32,
}

impl RateLimitRule {
    const fn new(per_second: u64, burst_size: u32) -> Self {
        Self {
            per_second,
            burst_size,
        }
    }
}

/// Per-group limits. `interaction` covers the toggle and messaging endpoints,
/// which are the ones hammered by repeated clicks.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth: RateLimitRule,
    pub public_read: RateLimitRule,
    pub protected: RateLimitRule,
    pub interaction: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: RateLimitRule::new(5, 10),
            public_read: RateLimitRule::new(30, 60),
            protected: RateLimitRule::new(10, 20),
            interaction: RateLimitRule::new(5, 15),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.enabled = super::parse_bool_env("RATE_LIMIT_ENABLED", cfg.enabled);

        if let Ok(raw) = env::var("RATE_LIMIT_CONFIG") {
            match parse_rate_limit_config(&raw) {
                Ok(parsed) => cfg = cfg.apply_overrides(parsed),
                Err(err) => {
                    tracing::warn!("Invalid RATE_LIMIT_CONFIG '{}': {}", raw, err);
                }
            }
        }

        cfg
    }

    fn apply_overrides(mut self, overrides: Vec<(Group, RateLimitRule)>) -> Self {
        for (group, rule) in overrides {
            match group {
                Group::All => {
                    self.auth = rule;
                    self.public_read = rule;
                    self.protected = rule;
                    self.interaction = rule;
                }
                Group::Auth => self.auth = rule,
                Group::PublicRead => self.public_read = rule,
                Group::Protected => self.protected = rule,
                Group::Interaction => self.interaction = rule,
            }
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    All,
    Auth,
    PublicRead,
    Protected,
    Interaction,
}

impl Group {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auth" => Some(Group::Auth),
            "public" | "public_read" | "public-read" => Some(Group::PublicRead),
            "protected" => Some(Group::Protected),
            "interaction" | "interactions" => Some(Group::Interaction),
            _ => None,
        }
    }
}

/// Accepts either a global `per:burst` rule or a comma-separated list of
/// `group=per:burst` overrides. Later entries win.
fn parse_rate_limit_config(raw: &str) -> Result<Vec<(Group, RateLimitRule)>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty value".to_string());
    }

    if !trimmed.contains('=') {
        return Ok(vec![(Group::All, parse_rule(trimmed)?)]);
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (name, raw_rule) = item
                .split_once('=')
                .ok_or_else(|| format!("invalid item '{}', expected name=per:burst", item))?;
            let group = Group::parse(name.trim()).ok_or_else(|| {
                format!(
                    "unknown group '{}', expected auth/public/protected/interaction",
                    name.trim()
                )
            })?;
            Ok((group, parse_rule(raw_rule.trim())?))
        })
        .collect()
}

fn parse_rule(raw: &str) -> Result<RateLimitRule, String> {
    let (per_second_raw, burst_raw) = raw
        .split_once(':')
        .ok_or_else(|| format!("invalid rule '{}', expected per:burst", raw))?;

    let per_second: u64 = per_second_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid per_second '{}'", per_second_raw.trim()))?;
    let burst_size: u32 = burst_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid burst_size '{}'", burst_raw.trim()))?;

    if per_second == 0 || burst_size == 0 {
        return Err("per_second and burst_size must be > 0".to_string());
    }

    Ok(RateLimitRule::new(per_second, burst_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_rule_applies_to_every_group() {
        let cfg = RateLimitConfig::default()
            .apply_overrides(parse_rate_limit_config("12:24").unwrap());
        assert_eq!(cfg.auth, RateLimitRule::new(12, 24));
        assert_eq!(cfg.interaction, RateLimitRule::new(12, 24));
    }

    #[test]
    fn grouped_rules_only_touch_named_groups() {
        let cfg = RateLimitConfig::default()
            .apply_overrides(parse_rate_limit_config("auth=1:2, interaction=3:4").unwrap());
        assert_eq!(cfg.auth, RateLimitRule::new(1, 2));
        assert_eq!(cfg.interaction, RateLimitRule::new(3, 4));
        assert_eq!(cfg.public_read, RateLimitConfig::default().public_read);
    }

    #[test]
    fn public_read_aliases() {
        let parsed = parse_rate_limit_config("public-read=8:16").unwrap();
        assert_eq!(parsed, vec![(Group::PublicRead, RateLimitRule::new(8, 16))]);
    }

    #[test]
    fn rejects_malformed_and_zero_rules() {
        assert!(parse_rate_limit_config("auth=abc")
            .unwrap_err()
            .contains("invalid rule"));
        assert!(parse_rate_limit_config("0:5").is_err());
        assert!(parse_rate_limit_config("bogus=1:1")
            .unwrap_err()
            .contains("unknown group"));
    }
}
