/// A line-oriented transport feeding the serial frame loop.
pub trait LineSource {
    /// Returns the next complete line with surrounding whitespace trimmed.
    ///
    /// `Ok(None)` means nothing arrived before the transport's poll interval or
    /// read timeout elapsed. The caller is expected to check for cancellation
    /// and call again.
    fn next_line(&mut self) -> anyhow::Result<Option<String>>;
}
