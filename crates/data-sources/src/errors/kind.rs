/// Failure classification by kind, not by exception type.
///
/// The orchestrator treats every kind the same way inside a cascade
/// (advance to the next candidate/provider); the HTTP boundary uses the
/// kind of the terminal failure to pick a status code and message family.
///
/// | Kind | Cascade behavior | Surfaced as |
/// |------|------------------|-------------|
/// | `Config` | next provider, no I/O was attempted | 404 family |
/// | `Transport` | next provider, never same-provider retry | 404 family |
/// | `RateLimit` | next provider; remembered for the terminal envelope | 429 + code |
/// | `Upstream` | next provider | 404 family |
/// | `NotFound` | next provider | 404 + suggestion |
/// | `Parse` | next provider | 404 family |
/// | `Classification` | no cascade - nothing was tried | 404, distinct message |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// Required credential absent; the adapter declined without I/O.
    Config,

    /// Network failure, connection reset, abort or timeout.
    Transport,

    /// The provider's own rate-limit convention fired.
    RateLimit,

    /// Provider-signaled business error (status pair, error sentinel).
    Upstream,

    /// The provider answered but has no data for the symbol.
    NotFound,

    /// Response shape mismatch; no partial record is ever produced.
    Parse,

    /// The input matched no known symbol shape before any network call.
    Classification,
}
