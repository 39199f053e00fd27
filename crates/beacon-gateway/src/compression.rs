use flate2::{Compress, CompressError, Compression, FlushCompress};

/// Persistent per-connection zlib stream. The client keeps matching
/// decompression state, so output must reach the socket in the exact order
/// it was produced here; the writer task is the only caller.
pub struct ZlibStream {
    ctx: Compress,
}

impl ZlibStream {
    pub fn new() -> Self {
        Self {
            ctx: Compress::new(Compression::default(), true),
        }
    }

    /// Compress one serialized message, sync-flushed so the client can
    /// decode it without waiting for further input.
    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>, CompressError> {
        let mut output = Vec::with_capacity((input.len() / 2).max(64));
        let mut read = 0usize;

        loop {
            if output.len() == output.capacity() {
                output.reserve(output.capacity().max(64));
            }

            let before_in = self.ctx.total_in() as usize;
            let flush = if read < input.len() {
                FlushCompress::None
            } else {
                FlushCompress::Sync
            };
            self.ctx.compress_vec(&input[read..], &mut output, flush)?;
            read += self.ctx.total_in() as usize - before_in;

            // A sync flush is complete once zlib stops filling the buffer.
            if read == input.len()
                && matches!(flush, FlushCompress::Sync)
                && output.len() < output.capacity()
            {
                break;
            }
        }

        Ok(output)
    }
}

impl Default for ZlibStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Decompress, FlushDecompress};

    fn inflate(ctx: &mut Decompress, input: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(input.len() * 4 + 64);
        let mut read = 0usize;
        loop {
            if output.len() == output.capacity() {
                output.reserve(output.capacity().max(64));
            }
            let before_in = ctx.total_in() as usize;
            ctx.decompress_vec(&input[read..], &mut output, FlushDecompress::Sync)
                .expect("valid zlib stream");
            read += ctx.total_in() as usize - before_in;
            if read == input.len() && output.len() < output.capacity() {
                break;
            }
        }
        output
    }

    #[test]
    fn each_message_is_decodable_at_its_flush_boundary() {
        let mut stream = ZlibStream::new();
        let mut client = Decompress::new(true);

        let first = stream.compress(br#"{"op":1,"d":{"n":1}}"#).unwrap();
        assert_eq!(inflate(&mut client, &first), br#"{"op":1,"d":{"n":1}}"#);

        // The stream is stateful: the second message decodes only with the
        // same client context, at its own boundary.
        let second = stream.compress(br#"{"op":1,"d":{"n":2}}"#).unwrap();
        assert_eq!(inflate(&mut client, &second), br#"{"op":1,"d":{"n":2}}"#);
    }

    #[test]
    fn concatenated_chunks_reassemble() {
        let mut stream = ZlibStream::new();
        let mut client = Decompress::new(true);

        let payload = format!(r#"{{"op":0,"t":"MESSAGE_CREATE","d":"{}"}}"#, "x".repeat(8192));
        let compressed = stream.compress(payload.as_bytes()).unwrap();

        // Chunk boundaries carry no framing; the client concatenates.
        let mut reassembled = Vec::new();
        for chunk in compressed.chunks(1024) {
            reassembled.extend_from_slice(chunk);
        }
        assert_eq!(inflate(&mut client, &reassembled), payload.as_bytes());
    }
}
