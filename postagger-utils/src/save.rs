use std::fs::File;
use std::io::{BufWriter, Write};

use failure::Fallible;
use log::info;
use postagger::serialization::CborWrite;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SaveSchedule {
    /// Save after every epoch.
    Epoch,

    /// Save when the validation score improves.
    Best,

    /// Save after every epoch and when the validation score improves.
    EpochAndBest,
}

impl SaveSchedule {
    /// Create a scheduler from the schedule.
    ///
    /// Models are saved to `path` when they are the best model so far and
    /// to `path.epoch-N` after epoch `N`.
    pub fn to_save_scheduler(self, path: impl Into<String>) -> SaveScheduler {
        SaveScheduler {
            path: path.into(),
            best_score: None,
            schedule: self,
        }
    }
}

/// Scheduler that saves at points dictated by the schedule.
pub struct SaveScheduler {
    path: String,
    best_score: Option<f32>,
    schedule: SaveSchedule,
}

impl SaveScheduler {
    /// Best validation score so far.
    pub fn best_score(&self) -> Option<f32> {
        self.best_score
    }

    /// Save the model parameters when a save point has been reached.
    ///
    /// Returns the paths that the parameters were written to.
    pub fn save<M>(&mut self, model: &M, epoch: usize, score: f32) -> Fallible<Vec<String>>
    where
        M: CborWrite,
    {
        let mut saved = Vec::new();

        match self.schedule {
            SaveSchedule::Epoch | SaveSchedule::EpochAndBest => {
                let path = format!("{}.epoch-{}", self.path, epoch);
                write_model(model, &path)?;
                saved.push(path);
            }
            SaveSchedule::Best => (),
        }

        let improved = self.best_score.map(|best| score > best).unwrap_or(true);
        if improved {
            self.best_score = Some(score);

            match self.schedule {
                SaveSchedule::Best | SaveSchedule::EpochAndBest => {
                    write_model(model, &self.path)?;
                    saved.push(self.path.clone());
                }
                SaveSchedule::Epoch => (),
            }
        }

        Ok(saved)
    }
}

fn write_model<M>(model: &M, path: &str) -> Fallible<()>
where
    M: CborWrite,
{
    info!("Saving model parameters to: {}", path);
    let mut write = BufWriter::new(File::create(path)?);
    model.to_cbor_write(&mut write)?;
    write.flush()?;
    Ok(())
}
