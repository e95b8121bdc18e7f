//! Reader of bag-of-tasks traces.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;

use log::info;

use crate::core::bot::BagOfTasks;

/// Microseconds in a second.
const TIME_SCALE: i64 = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Column {
    User,
    JobId,
    TaskAmount,
    TaskLength,
    TaskTime,
    TaskDiskUsage,
    TaskRam,
    AverageTaskCpu,
    AverageTaskLength,
    TaskCores,
    SchedulingClass,
    JobCreationTime,
    JobStartTime,
    JobEndTime,
    ExecutionAttempts,
    EvictionAmounts,
}

impl Column {
    fn from_header(name: &str) -> Option<Self> {
        match name.trim() {
            "user" => Some(Column::User),
            "jobId" => Some(Column::JobId),
            "taskAmount" => Some(Column::TaskAmount),
            "taskLength" => Some(Column::TaskLength),
            "taskTime" => Some(Column::TaskTime),
            "taskDiskUsage" => Some(Column::TaskDiskUsage),
            "taskRam" => Some(Column::TaskRam),
            "averageTaskCpu" => Some(Column::AverageTaskCpu),
            "averageTaskLength" => Some(Column::AverageTaskLength),
            "taskCores" => Some(Column::TaskCores),
            "schedulingClass" => Some(Column::SchedulingClass),
            "jobCreationTime" => Some(Column::JobCreationTime),
            "jobStartTime" => Some(Column::JobStartTime),
            "jobEndTime" => Some(Column::JobEndTime),
            "executionAttempts" => Some(Column::ExecutionAttempts),
            "evictionAmounts" => Some(Column::EvictionAmounts),
            _ => None,
        }
    }
}

/// Reads bags of tasks from CSV trace with a header row.
///
/// Columns are located by header name, unknown columns are ignored and unparseable or missing numbers
/// read as zero. Job times are given in microseconds and truncated to whole seconds.
pub struct BotTraceReader {
    line_limit: Option<u64>,
}

impl BotTraceReader {
    /// Creates reader, `line_limit` bounds the number of rows read.
    pub fn new(line_limit: Option<u64>) -> Self {
        Self { line_limit }
    }

    pub fn parse_file(&self, file_name: &str) -> Result<Vec<BagOfTasks>, csv::Error> {
        let bots = self.parse(File::open(file_name)?)?;
        info!("Read {} bags of tasks from {}", bots.len(), file_name);
        Ok(bots)
    }

    /// Parses trace and returns bags sorted by job start time.
    pub fn parse<R: Read>(&self, reader: R) -> Result<Vec<BagOfTasks>, csv::Error> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let columns: HashMap<Column, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .filter_map(|(i, name)| Column::from_header(name).map(|c| (c, i)))
            .collect();

        let limit = self.line_limit.unwrap_or(u64::MAX);
        let mut result = Vec::new();
        for record in reader.records() {
            if result.len() as u64 >= limit {
                break;
            }
            let record = record?;
            let text = |column: Column| {
                columns
                    .get(&column)
                    .and_then(|i| record.get(*i))
                    .unwrap_or("")
                    .trim()
                    .to_string()
            };
            let float = |column: Column| text(column).parse::<f64>().unwrap_or(0.);
            let int = |column: Column| text(column).parse::<i64>().unwrap_or(0);
            let seconds = |column: Column| (int(column) / TIME_SCALE) as f64;

            result.push(BagOfTasks {
                user_id: text(Column::User),
                job_id: text(Column::JobId),
                task_count: int(Column::TaskAmount).max(0) as u64,
                task_length: float(Column::TaskLength),
                task_time: float(Column::TaskTime) / TIME_SCALE as f64,
                task_disk_usage: float(Column::TaskDiskUsage),
                task_ram_usage: float(Column::TaskRam),
                average_task_cpu: float(Column::AverageTaskCpu),
                task_cores: float(Column::TaskCores),
                scheduling_class: int(Column::SchedulingClass).max(0) as u64,
                job_creation_time: seconds(Column::JobCreationTime),
                job_start_time: seconds(Column::JobStartTime),
                job_end_time: seconds(Column::JobEndTime),
                execution_attempts: int(Column::ExecutionAttempts).max(0) as u64,
            });
        }
        result.sort_by(|a, b| a.job_start_time.total_cmp(&b.job_start_time));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = "\
user,jobId,taskAmount,taskLength,taskTime,taskDiskUsage,taskRam,averageTaskCpu,taskCores,schedulingClass,jobCreationTime,jobStartTime,jobEndTime,executionAttempts,extra
u1,j1,2,1000.5,2500000,0.01,0.2,0.5,1,0,5000000,9999999,12000000,1,x
u2,j2,oops,500,1000000,0.02,0.1,0.3,1,1,1000000,3000000,4000000,1,y
u3,j3,4,800,,0.03,0.3,0.2,1,2,2000000,6000000,8000000,2,z
";

    #[test]
    fn test_parse_trace() {
        let bots = BotTraceReader::new(None).parse(TRACE.as_bytes()).unwrap();
        assert_eq!(bots.len(), 3);
        // sorted by start time: 3, 6, 9 seconds
        assert_eq!(bots[0].job_id, "j2");
        assert_eq!(bots[0].task_count, 0);
        assert_eq!(bots[1].job_id, "j3");
        assert_eq!(bots[1].task_time, 0.);
        assert_eq!(bots[2].job_id, "j1");
        assert_eq!(bots[2].task_length, 1000.5);
        assert_eq!(bots[2].task_time, 2.5);
        assert_eq!(bots[2].job_start_time, 9.);
        assert_eq!(bots[2].job_creation_time, 5.);
        assert_eq!(bots[2].task_cores, 1.);
    }

    #[test]
    fn test_line_limit() {
        let bots = BotTraceReader::new(Some(2)).parse(TRACE.as_bytes()).unwrap();
        assert_eq!(bots.len(), 2);
        assert_eq!(bots[0].job_id, "j2");
        assert_eq!(bots[1].job_id, "j1");
    }

    #[test]
    fn test_missing_columns() {
        let bots = BotTraceReader::new(None)
            .parse("jobId,taskLength\nonly,42\n".as_bytes())
            .unwrap();
        assert_eq!(bots[0].job_id, "only");
        assert_eq!(bots[0].task_length, 42.);
        assert_eq!(bots[0].user_id, "");
        assert_eq!(bots[0].task_count, 0);
    }
}
