/// Per-worker processing options.
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// Rows per load call; also the most items taken from the queue at once.
    pub batch_size: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { batch_size: 200 }
    }
}

impl ProcessorConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}
