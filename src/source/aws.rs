use crate::config::ExporterConfig;
use crate::models::{CostGroup, Granularity, TimeRange};
use crate::source::{CostSource, FetchError};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_costexplorer::error::DisplayErrorContext;
use aws_sdk_costexplorer::types::{
    DateInterval, Dimension, DimensionValues, Expression, Granularity as AwsGranularity,
    GroupDefinition, GroupDefinitionType, ResultByTime,
};
use aws_sdk_costexplorer::Client;
use tracing::debug;

const GROUP_DIMENSIONS: [&str; 2] = ["SERVICE", "REGION"];

pub struct CostExplorerSource {
    client: Client,
    metric: String,
    linked_accounts: Vec<String>,
}

impl CostExplorerSource {
    pub async fn from_config(cfg: &ExporterConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .load()
            .await;
        Self {
            client: Client::new(&sdk_config),
            metric: cfg.cost_metric.clone(),
            linked_accounts: cfg.linked_accounts.clone(),
        }
    }

    fn granularity(granularity: Granularity) -> AwsGranularity {
        match granularity {
            Granularity::Daily => AwsGranularity::Daily,
            Granularity::Monthly => AwsGranularity::Monthly,
        }
    }

    fn account_filter(&self) -> Option<Expression> {
        if self.linked_accounts.is_empty() {
            return None;
        }
        Some(
            Expression::builder()
                .dimensions(
                    DimensionValues::builder()
                        .key(Dimension::LinkedAccount)
                        .set_values(Some(self.linked_accounts.clone()))
                        .build(),
                )
                .build(),
        )
    }

    fn collect_groups(results: &[ResultByTime], out: &mut Vec<CostGroup>) {
        for result in results {
            for group in result.groups() {
                let metrics = group
                    .metrics()
                    .map(|m| {
                        m.iter()
                            .map(|(name, value)| (name.clone(), value.amount().map(str::to_string)))
                            .collect()
                    })
                    .unwrap_or_default();
                out.push(CostGroup {
                    keys: group.keys().to_vec(),
                    metrics,
                });
            }
        }
    }
}

#[async_trait]
impl CostSource for CostExplorerSource {
    fn name(&self) -> &'static str {
        "aws-cost-explorer"
    }

    async fn fetch(
        &self,
        range: &TimeRange,
        granularity: Granularity,
    ) -> Result<Vec<CostGroup>, FetchError> {
        let period = DateInterval::builder()
            .start(range.start_str())
            .end(range.end_str())
            .build()
            .map_err(|e| FetchError::InvalidRange(format!("{range}: {e}")))?;

        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let mut req = self
                .client
                .get_cost_and_usage()
                .time_period(period.clone())
                .granularity(Self::granularity(granularity))
                .metrics(self.metric.clone())
                .set_filter(self.account_filter())
                .set_next_page_token(page_token.take());
            for key in GROUP_DIMENSIONS {
                req = req.group_by(
                    GroupDefinition::builder()
                        .r#type(GroupDefinitionType::Dimension)
                        .key(key)
                        .build(),
                );
            }

            let response = req
                .send()
                .await
                .map_err(|e| FetchError::Request(DisplayErrorContext(&e).to_string()))?;
            pages += 1;
            Self::collect_groups(response.results_by_time(), &mut out);

            match response.next_page_token() {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(%range, pages, groups = out.len(), "cost explorer query complete");
        Ok(out)
    }
}
