/// Failure talking to an AI backend. Never crosses the adapter boundary;
/// [`super::AiProvider`] turns it into `None`.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("{provider} transport failure ({kind}): {detail}")]
    Transport {
        provider: &'static str,
        kind: &'static str,
        detail: String,
    },

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} returned a malformed payload: {detail}")]
    Malformed {
        provider: &'static str,
        detail: String,
    },

    #[error("{provider} returned no text")]
    Empty { provider: &'static str },
}

impl ProviderError {
    pub fn from_ureq(provider: &'static str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) => ProviderError::Status { provider, status },
            ureq::Error::Transport(transport) => {
                let detail = transport.to_string();
                ProviderError::Transport {
                    provider,
                    kind: classify_transport_error_kind(&format!("{:?} {detail}", transport.kind())),
                    detail,
                }
            }
        }
    }

    pub fn malformed(provider: &'static str, detail: impl Into<String>) -> Self {
        ProviderError::Malformed {
            provider,
            detail: detail.into(),
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}
