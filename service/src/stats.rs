use crate::arrow_io::LogColumns;
use crate::error::ServiceResult;
use arrow::array::UInt16Array;
use arrow::compute::kernels::cmp::{eq, neq};
use arrow::compute::{filter_record_batch, max, min};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatsOptions {
    /// Length of every top-N list
    #[serde(default = "default_top")]
    pub top: usize,
    /// A host is "frequent" above this many requests
    #[serde(default = "default_min_requests")]
    pub min_requests: usize,
}

fn default_top() -> usize {
    10
}

fn default_min_requests() -> usize {
    10
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            top: default_top(),
            min_requests: default_min_requests(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContentSizeStats {
    pub count: usize,
    pub min: u64,
    pub max: u64,
    pub avg: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCount {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeCount {
    pub code: u16,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCount {
    /// Day of month, in the log's own offset
    pub day: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotFoundStats {
    pub count: usize,
    pub top_endpoints: Vec<KeyCount>,
    pub top_hosts: Vec<KeyCount>,
    pub per_day: Vec<DayCount>,
    pub per_hour: Vec<HourCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsReport {
    pub total_requests: usize,
    pub content_size: ContentSizeStats,
    pub response_codes: Vec<CodeCount>,
    pub frequent_hosts: Vec<KeyCount>,
    pub top_endpoints: Vec<KeyCount>,
    pub top_error_endpoints: Vec<KeyCount>,
    pub unique_hosts: usize,
    pub daily_unique_hosts: Vec<DayCount>,
    pub avg_daily_requests_per_host: Vec<DayCount>,
    pub not_found: NotFoundStats,
}

#[derive(Default)]
struct Tally {
    requests: usize,
    size_min: Option<u64>,
    size_max: Option<u64>,
    size_sum: u128,
    codes: BTreeMap<u16, usize>,
    hosts: HashMap<String, usize>,
    endpoints: HashMap<String, usize>,
    error_endpoints: HashMap<String, usize>,
    day_requests: BTreeMap<u32, usize>,
    day_hosts: BTreeMap<u32, HashSet<String>>,
    nf_count: usize,
    nf_endpoints: HashMap<String, usize>,
    nf_hosts: HashMap<String, usize>,
    nf_days: BTreeMap<u32, usize>,
    nf_hours: BTreeMap<u32, usize>,
}

impl Tally {
    fn add_batch(&mut self, batch: &RecordBatch) -> ServiceResult<()> {
        let cols = LogColumns::new(batch)?;
        self.requests += cols.len();

        if let Some(v) = min(cols.content_size) {
            self.size_min = Some(self.size_min.map_or(v, |m| m.min(v)));
        }
        if let Some(v) = max(cols.content_size) {
            self.size_max = Some(self.size_max.map_or(v, |m| m.max(v)));
        }
        // summed in u128, two u64::MAX sizes already overflow u64
        self.size_sum += cols
            .content_size
            .values()
            .iter()
            .map(|&v| u128::from(v))
            .sum::<u128>();

        for i in 0..cols.len() {
            let host = cols.host.value(i);
            *self.codes.entry(cols.response_code.value(i)).or_insert(0) += 1;
            bump(&mut self.hosts, host);
            bump(&mut self.endpoints, cols.endpoint.value(i));

            if let Some((day, _)) = local_day_hour(cols.ts_ns.value(i), cols.utc_offset_secs.value(i)) {
                *self.day_requests.entry(day).or_insert(0) += 1;
                let hosts = self.day_hosts.entry(day).or_default();
                if !hosts.contains(host) {
                    hosts.insert(host.to_string());
                }
            }
        }

        let errors = filter_record_batch(
            batch,
            &neq(cols.response_code, &UInt16Array::new_scalar(200))?,
        )?;
        let err_cols = LogColumns::new(&errors)?;
        for i in 0..err_cols.len() {
            bump(&mut self.error_endpoints, err_cols.endpoint.value(i));
        }

        let not_found = filter_record_batch(
            batch,
            &eq(cols.response_code, &UInt16Array::new_scalar(404))?,
        )?;
        let nf_cols = LogColumns::new(&not_found)?;
        self.nf_count += nf_cols.len();
        for i in 0..nf_cols.len() {
            bump(&mut self.nf_endpoints, nf_cols.endpoint.value(i));
            bump(&mut self.nf_hosts, nf_cols.host.value(i));
            if let Some((day, hour)) =
                local_day_hour(nf_cols.ts_ns.value(i), nf_cols.utc_offset_secs.value(i))
            {
                *self.nf_days.entry(day).or_insert(0) += 1;
                *self.nf_hours.entry(hour).or_insert(0) += 1;
            }
        }

        Ok(())
    }

    fn finish(self, opts: &StatsOptions) -> StatsReport {
        let content_size = ContentSizeStats {
            count: self.requests,
            min: self.size_min.unwrap_or(0),
            max: self.size_max.unwrap_or(0),
            avg: if self.requests > 0 {
                self.size_sum as f64 / self.requests as f64
            } else {
                0.0
            },
        };

        let avg_daily_requests_per_host = self
            .day_hosts
            .iter()
            .map(|(&day, hosts)| DayCount {
                day,
                count: self.day_requests.get(&day).copied().unwrap_or(0) / hosts.len().max(1),
            })
            .collect();

        let mut frequent_hosts: Vec<KeyCount> = self
            .hosts
            .iter()
            .filter(|(_, &count)| count > opts.min_requests)
            .map(|(key, &count)| KeyCount {
                key: key.clone(),
                count,
            })
            .collect();
        sort_desc(&mut frequent_hosts);

        StatsReport {
            total_requests: self.requests,
            content_size,
            response_codes: self
                .codes
                .iter()
                .map(|(&code, &count)| CodeCount { code, count })
                .collect(),
            frequent_hosts,
            top_endpoints: top_n(self.endpoints, opts.top),
            top_error_endpoints: top_n(self.error_endpoints, opts.top),
            unique_hosts: self.hosts.len(),
            daily_unique_hosts: self
                .day_hosts
                .iter()
                .map(|(&day, hosts)| DayCount {
                    day,
                    count: hosts.len(),
                })
                .collect(),
            avg_daily_requests_per_host,
            not_found: NotFoundStats {
                count: self.nf_count,
                top_endpoints: top_n(self.nf_endpoints, opts.top),
                top_hosts: top_n(self.nf_hosts, opts.top),
                per_day: self
                    .nf_days
                    .into_iter()
                    .map(|(day, count)| DayCount { day, count })
                    .collect(),
                per_hour: self
                    .nf_hours
                    .into_iter()
                    .map(|(hour, count)| HourCount { hour, count })
                    .collect(),
            },
        }
    }
}

/// Full statistics report over every batch of a session.
pub fn compute_stats(batches: &[RecordBatch], opts: &StatsOptions) -> ServiceResult<StatsReport> {
    let mut tally = Tally::default();
    for batch in batches {
        tally.add_batch(batch)?;
    }
    debug!("Computed stats over {} rows", tally.requests);
    Ok(tally.finish(opts))
}

fn bump(map: &mut HashMap<String, usize>, key: &str) {
    match map.get_mut(key) {
        Some(count) => *count += 1,
        None => {
            map.insert(key.to_string(), 1);
        }
    }
}

/// Day of month and hour of day in the offset the line was logged in.
fn local_day_hour(ts_ns: i64, utc_offset_secs: i32) -> Option<(u32, u32)> {
    let local_secs = ts_ns.div_euclid(1_000_000_000) + i64::from(utc_offset_secs);
    DateTime::from_timestamp(local_secs, 0).map(|dt| (dt.day(), dt.hour()))
}

/// Count descending, then key ascending.
fn sort_desc(items: &mut [KeyCount]) {
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
}

fn top_n(map: HashMap<String, usize>, n: usize) -> Vec<KeyCount> {
    let mut items: Vec<KeyCount> = map
        .into_iter()
        .map(|(key, count)| KeyCount { key, count })
        .collect();
    sort_desc(&mut items);
    items.truncate(n);
    items
}
