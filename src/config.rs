use serde::Deserialize;

/// Zoho data centre. Each region has its own API and accounts (OAuth) hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZohoRegion {
    Us,
    India,
    Europe,
    Australia,
    Japan,
    Canada,
    China,
    SaudiArabia,
    UnitedKingdom,
}

impl ZohoRegion {
    const ALL: [ZohoRegion; 9] = [
        ZohoRegion::Us,
        ZohoRegion::India,
        ZohoRegion::Europe,
        ZohoRegion::Australia,
        ZohoRegion::Japan,
        ZohoRegion::Canada,
        ZohoRegion::China,
        ZohoRegion::SaudiArabia,
        ZohoRegion::UnitedKingdom,
    ];

    /// Parses the `ZOHO_DC` code (country code or domain suffix).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "us" | "com" => Some(ZohoRegion::Us),
            "in" => Some(ZohoRegion::India),
            "eu" => Some(ZohoRegion::Europe),
            "au" | "com.au" => Some(ZohoRegion::Australia),
            "jp" => Some(ZohoRegion::Japan),
            "ca" => Some(ZohoRegion::Canada),
            "cn" | "com.cn" => Some(ZohoRegion::China),
            "sa" => Some(ZohoRegion::SaudiArabia),
            "uk" => Some(ZohoRegion::UnitedKingdom),
            _ => None,
        }
    }

    /// Infers the region from a configured API domain, falling back to the US data centre.
    pub fn from_api_domain(api_domain: &str) -> Self {
        let host = url::Url::parse(api_domain)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| api_domain.to_string());

        // Longest suffix first so ".com.au" wins over ".com".
        let mut regions = Self::ALL.to_vec();
        regions.sort_by_key(|r| std::cmp::Reverse(r.suffix().len()));
        regions
            .into_iter()
            .find(|r| host.ends_with(&format!("zohoapis{}", r.suffix())))
            .unwrap_or(ZohoRegion::Us)
    }

    fn suffix(self) -> &'static str {
        match self {
            ZohoRegion::Us => ".com",
            ZohoRegion::India => ".in",
            ZohoRegion::Europe => ".eu",
            ZohoRegion::Australia => ".com.au",
            ZohoRegion::Japan => ".jp",
            ZohoRegion::Canada => ".ca",
            ZohoRegion::China => ".com.cn",
            ZohoRegion::SaudiArabia => ".sa",
            ZohoRegion::UnitedKingdom => ".uk",
        }
    }

    pub fn api_domain(self) -> String {
        format!("https://www.zohoapis{}", self.suffix())
    }

    pub fn accounts_domain(self) -> String {
        match self {
            ZohoRegion::Canada => "https://accounts.zohocloud.ca".to_string(),
            other => format!("https://accounts.zoho{}", other.suffix()),
        }
    }
}

/// How the uploaded file is attached to the CRM record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AttachmentMode {
    /// Zoho stores the link; no bytes pass through this service.
    Link,
    /// The file is downloaded and re-uploaded as a binary attachment.
    File,
}

impl AttachmentMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "link" | "url" => Some(AttachmentMode::Link),
            "file" | "binary" => Some(AttachmentMode::File),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub zoho_api_domain: String,
    pub zoho_accounts_domain: String,
    pub zoho_module: String,
    pub zoho_client_id: String,
    pub zoho_client_secret: String,
    pub zoho_refresh_token: String,
    pub pipefile_file_base_url: String,
    pub attachment_mode: AttachmentMode,
    pub attachment_max_bytes: u64,
    pub http_timeout_secs: u64,
}

pub const DEFAULT_MODULE: &str = "Leads";
pub const DEFAULT_PIPEFILE_FILE_BASE_URL: &str = "https://api.pipefile.com/v1/file_pipes";
const DEFAULT_ATTACHMENT_MAX_BYTES: u64 = 20 * 1024 * 1024;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Zoho API domain: {}", config.zoho_api_domain);
        tracing::debug!("Zoho accounts domain: {}", config.zoho_accounts_domain);
        tracing::debug!("Zoho module: {}", config.zoho_module);
        tracing::debug!("Attachment mode: {:?}", config.attachment_mode);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| {
                anyhow::anyhow!("{} environment variable required and cannot be empty", key)
            })
        };
        let url_var = |key: &str, value: String| -> anyhow::Result<String> {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", key);
            }
            Ok(value.trim_end_matches('/').to_string())
        };

        let region = match optional("ZOHO_DC") {
            Some(code) => ZohoRegion::from_code(&code)
                .ok_or_else(|| anyhow::anyhow!("ZOHO_DC '{}' is not a known Zoho data centre", code))?,
            None => ZohoRegion::Us,
        };

        let zoho_api_domain = match optional("ZOHO_API_DOMAIN") {
            Some(domain) => url_var("ZOHO_API_DOMAIN", domain)?,
            None => region.api_domain(),
        };

        let zoho_accounts_domain = match optional("ZOHO_ACCOUNTS_DOMAIN") {
            Some(domain) => url_var("ZOHO_ACCOUNTS_DOMAIN", domain)?,
            None if optional("ZOHO_DC").is_some() => region.accounts_domain(),
            None => ZohoRegion::from_api_domain(&zoho_api_domain).accounts_domain(),
        };

        let pipefile_file_base_url = match optional("PIPEFILE_FILE_BASE_URL") {
            Some(url) => url_var("PIPEFILE_FILE_BASE_URL", url)?,
            None => DEFAULT_PIPEFILE_FILE_BASE_URL.to_string(),
        };

        let attachment_mode = match optional("ZOHO_ATTACHMENT_MODE") {
            Some(mode) => AttachmentMode::parse(&mode).ok_or_else(|| {
                anyhow::anyhow!("ZOHO_ATTACHMENT_MODE must be 'link' or 'file', got '{}'", mode)
            })?,
            None => AttachmentMode::Link,
        };

        Ok(Self {
            port: optional("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            zoho_api_domain,
            zoho_accounts_domain,
            zoho_module: optional("ZOHO_MODULE").unwrap_or_else(|| DEFAULT_MODULE.to_string()),
            zoho_client_id: required("ZOHO_CLIENT_ID")?,
            zoho_client_secret: required("ZOHO_CLIENT_SECRET")?,
            zoho_refresh_token: required("ZOHO_REFRESH_TOKEN")?,
            pipefile_file_base_url,
            attachment_mode,
            attachment_max_bytes: match optional("ATTACHMENT_MAX_BYTES") {
                Some(v) => v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("ATTACHMENT_MAX_BYTES must be a byte count"))?,
                None => DEFAULT_ATTACHMENT_MAX_BYTES,
            },
            http_timeout_secs: match optional("HTTP_TIMEOUT_SECS") {
                Some(v) => v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a number of seconds"))?,
                None => DEFAULT_HTTP_TIMEOUT_SECS,
            },
        })
    }
}
