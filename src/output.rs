//! Subscription document rendering
//!
//! The document is what subscription clients download: a metadata header,
//! one link per line, then a redirect script for browsers that open the URL
//! directly. Clients parse the header and link lines, so their layout is
//! fixed.

use crate::proxy::models::AggregationResult;
use crate::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// Default profile title shown by clients
pub const DEFAULT_TITLE: &str = "SHΞN™ Subscription";

/// Default config reference advertised in the header
pub const DEFAULT_CONFIG_URL: &str =
    "https://raw.githubusercontent.com/Shervinuri/SUBscripSHEN/refs/heads/main/SUBscripSHEN.json";

const UPDATE_INTERVAL_HOURS: u32 = 1;

/// Synthetic quota: 10 GiB, no usage
const TOTAL_QUOTA_BYTES: u64 = 10_737_418_240;

/// Synthetic expiry: 2025-01-01T00:00:00Z
const EXPIRE_TIMESTAMP: i64 = 1_735_689_600;

const REDIRECT_SCRIPT: &str = r##"
<script>
setTimeout(function() {
    if (window.location.href.indexOf('hiddify://') === -1) {
        window.location.href = 'hiddify://import/' + window.location.href + '#SHEN';
    }
}, 3000);

document.addEventListener('DOMContentLoaded', function() {
    if (navigator.userAgent.indexOf('v2ray') === -1 && navigator.userAgent.indexOf('clash') === -1) {
        document.body.innerHTML = `
            <div style="font-family: Arial, sans-serif; text-align: center; padding: 50px; background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; min-height: 100vh;">
                <h1 style="font-size: 3em; margin-bottom: 20px;">SHΞN™ V2Ray Subscription</h1>
                <div style="font-size: 1.5em; margin-bottom: 30px;">
                    <div style="animation: pulse 2s infinite;">🚀 Redirecting to Hiddify...</div>
                </div>
                <div style="background: rgba(255,255,255,0.1); padding: 20px; border-radius: 10px; margin: 20px auto; max-width: 600px;">
                    <h3>📱 How to use:</h3>
                    <p>1. Copy this URL: <code style="background: rgba(0,0,0,0.3); padding: 5px; border-radius: 5px;">shervin.kortix.cloud</code></p>
                    <p>2. Add to your V2Ray client as subscription link</p>
                    <p>3. Or wait for automatic redirect to Hiddify</p>
                </div>
                <div style="margin-top: 30px; font-size: 0.9em; opacity: 0.8;">
                    <p>🔄 Auto-updated every hour</p>
                    <p>🌍 Servers from multiple countries</p>
                    <p>⚡ High-speed connections</p>
                    <p>📊 Total configs: {count}</p>
                    <p>⏰ Last updated: {updated}</p>
                </div>
            </div>
            <style>
                @keyframes pulse {
                    0% { opacity: 1; }
                    50% { opacity: 0.5; }
                    100% { opacity: 1; }
                }
                code {
                    word-break: break-all;
                }
            </style>
        `;
    }
});
</script>"##;

/// Header values of a subscription document
#[derive(Debug, Clone)]
pub struct SubscriptionDocument {
    pub title: String,
    pub config_url: String,
}

impl Default for SubscriptionDocument {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            config_url: DEFAULT_CONFIG_URL.to_string(),
        }
    }
}

impl SubscriptionDocument {
    /// Metadata block, terminated by a blank line
    pub fn header(&self) -> String {
        format!(
            "#profile-title: base64:{}\n\
             #profile-update-interval:{}\n\
             #subscription-userinfo: upload=0; download=0; total={}; expire={}\n\
             #hiddify-config: {}\n\n",
            STANDARD.encode(self.title.as_bytes()),
            UPDATE_INTERVAL_HOURS,
            TOTAL_QUOTA_BYTES,
            EXPIRE_TIMESTAMP,
            self.config_url,
        )
    }

    /// Render the full document for `result`
    pub fn render(&self, result: &AggregationResult, generated_at: DateTime<Utc>) -> String {
        let script = REDIRECT_SCRIPT
            .replace("{count}", &result.len().to_string())
            .replace(
                "{updated}",
                &generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );

        format!("{}{}{}", self.header(), result.lines().join("\n"), script)
    }
}

/// Write a rendered document to `path`
pub fn write_document<P: AsRef<Path>>(path: P, contents: &str) -> Result<()> {
    fs::write(path, contents)?;
    Ok(())
}
