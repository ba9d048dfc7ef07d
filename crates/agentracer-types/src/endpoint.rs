use std::fmt;

/// Ingestion endpoints, relative to the configured host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Generic per-call telemetry
    Ingest,
    RunStart,
    RunStep,
    RunEnd,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Ingest => "/api/ingest",
            Endpoint::RunStart => "/api/runs/start",
            Endpoint::RunStep => "/api/runs/step",
            Endpoint::RunEnd => "/api/runs/end",
        }
    }

    /// Join the endpoint path onto a host, tolerating a trailing slash
    pub fn url(&self, host: &str) -> String {
        format!("{}{}", host.trim_end_matches('/'), self.path())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(Endpoint::Ingest.path(), "/api/ingest");
        assert_eq!(Endpoint::RunStart.path(), "/api/runs/start");
        assert_eq!(Endpoint::RunStep.path(), "/api/runs/step");
        assert_eq!(Endpoint::RunEnd.path(), "/api/runs/end");
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        assert_eq!(
            Endpoint::Ingest.url("https://api.agentracer.dev/"),
            "https://api.agentracer.dev/api/ingest"
        );
        assert_eq!(
            Endpoint::RunEnd.url("http://localhost:8080"),
            "http://localhost:8080/api/runs/end"
        );
    }
}
