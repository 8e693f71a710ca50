use serde::{Deserialize, de::DeserializeOwned};
use stackctl_lib::{ServiceStatus, StackSummary};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawContainer {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    service: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    health: String,
    #[serde(default)]
    publishers: Vec<RawPublisher>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPublisher {
    #[serde(rename = "URL", default)]
    url: String,
    #[serde(default)]
    target_port: u16,
    #[serde(default)]
    published_port: u16,
    #[serde(default)]
    protocol: String,
}

impl RawPublisher {
    fn render(&self) -> String {
        if self.published_port == 0 {
            format!("{}/{}", self.target_port, self.protocol)
        } else {
            format!(
                "{}:{}->{}/{}",
                self.url, self.published_port, self.target_port, self.protocol
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStack {
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    config_files: String,
}

/// `docker compose ... --format json` prints either one array or one
/// object per line depending on the version.
fn parse_records<T: DeserializeOwned>(json: &str) -> anyhow::Result<Vec<T>> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Vec::new());
    }

    if json.starts_with('[') {
        return Ok(serde_json::from_str(json)?);
    }

    json.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from))
        .collect()
}

pub fn parse_ps(json: &str) -> anyhow::Result<Vec<ServiceStatus>> {
    let containers: Vec<RawContainer> = parse_records(json)?;

    Ok(containers
        .into_iter()
        .map(|c| {
            let mut ports: Vec<String> = Vec::new();
            for port in c.publishers.iter().map(RawPublisher::render) {
                if !ports.contains(&port) {
                    ports.push(port);
                }
            }

            ServiceStatus {
                id: c.id,
                name: c.name,
                service: c.service,
                state: c.state,
                health: Some(c.health).filter(|h| !h.is_empty()),
                ports,
            }
        })
        .collect())
}

pub fn parse_ls(json: &str) -> anyhow::Result<Vec<StackSummary>> {
    let stacks: Vec<RawStack> = parse_records(json)?;

    Ok(stacks
        .into_iter()
        .map(|s| StackSummary {
            name: s.name,
            status: s.status,
            config_files: s.config_files,
        })
        .collect())
}
