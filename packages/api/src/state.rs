use crate::prediction_log::{NoopPredictionLog, PredictionSink};
use crate::vegetation::VegetationIndexSource;
use crop_advisor_ml::ModelManager;
use std::sync::Arc;

pub type AppState = Arc<State>;

pub struct State {
    pub models: Arc<ModelManager>,
    pub prediction_log: Arc<dyn PredictionSink>,
    /// Fills `ndvi` from a request's location when set
    pub vegetation: Option<Arc<dyn VegetationIndexSource>>,
}

impl State {
    pub fn new(models: ModelManager) -> Self {
        Self {
            models: Arc::new(models),
            prediction_log: Arc::new(NoopPredictionLog),
            vegetation: None,
        }
    }

    pub fn with_prediction_log(mut self, sink: Arc<dyn PredictionSink>) -> Self {
        self.prediction_log = sink;
        self
    }

    pub fn with_vegetation_source(mut self, source: Arc<dyn VegetationIndexSource>) -> Self {
        self.vegetation = Some(source);
        self
    }
}
