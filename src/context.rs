use crate::config::PipelineConfig;
use crate::countries::CountryTable;
use crate::error::TaskError;
use crate::progress::PipelineProgress;
use crate::runner::{Record, TaskOutput, TaskRunner};
use crate::source::{DocumentSource, NewsSearch};
use anyhow::Result;
use std::fmt::Display;
use std::sync::Arc;

/// Everything a stage reads: configuration, the country table, the two
/// capabilities and the progress reporter. Built once and passed by reference.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub countries: CountryTable,
    pub documents: Arc<dyn DocumentSource>,
    pub search: Arc<dyn NewsSearch>,
    pub progress: PipelineProgress,
}

impl PipelineContext {
    /// Loads the country table named by `config`.
    pub fn load(
        config: PipelineConfig,
        documents: Arc<dyn DocumentSource>,
        search: Arc<dyn NewsSearch>,
        progress: PipelineProgress,
    ) -> Result<Self> {
        let countries = CountryTable::load(&config.country_path())?;
        Ok(Self { config, countries, documents, search, progress })
    }

    /// One worker pass with its own progress bar. Records are flattened back to
    /// plain values.
    pub fn run_pass<I, A, T, F>(&self, name: &str, workers: usize, input: Vec<I>, task: F, args: &A) -> Result<Vec<T>>
    where
        I: Display + Send,
        A: Sync + ?Sized,
        T: Send,
        F: Fn(I, &A) -> Result<TaskOutput<T>, TaskError> + Sync,
    {
        let bar = self.progress.items(input.len(), name);
        let runner = TaskRunner::new(name, workers)
            .with_thread_limit(self.config.thread_limit())
            .with_progress(bar.clone());
        let records = runner.run(input, task, args, Vec::new());
        bar.finish_and_clear();
        Ok(records?.into_iter().map(Record::into_value).collect())
    }
}
