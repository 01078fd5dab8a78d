use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RelayError {
    #[snafu(display("failed to load relay configuration"))]
    ConfigExtract {
        stage: &'static str,
        source: figment::Error,
    },
    #[snafu(display("upstream request failed on `{stage}`: {source}"))]
    UpstreamRequest {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("upstream returned status {status}: {detail}"))]
    UpstreamStatus {
        stage: &'static str,
        status: u16,
        detail: String,
    },
    #[snafu(display("failed to bind relay listener on {addr}"))]
    BindListener {
        stage: &'static str,
        addr: String,
        source: std::io::Error,
    },
    #[snafu(display("relay server failed while serving"))]
    Serve {
        stage: &'static str,
        source: std::io::Error,
    },
}

pub type RelayResult<T> = Result<T, RelayError>;
