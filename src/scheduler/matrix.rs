//! Enumeration of the template x target matrix
//!
//! The matrix is cut into outer groups: one group per template under
//! host-spray, one group per target (and pool) under template-spray. Each
//! group lands in the pool of its templates' cost class. Sequence numbers
//! follow the global enumeration order, so the order is reproducible from
//! the plan alone.

use std::sync::Arc;

use super::config::ScanStrategy;
use super::types::{CostClass, Target, Template, WorkItem};

/// Pick the concrete strategy for `auto`
///
/// Template-spray when targets outnumber templates by more than `ratio`,
/// so dead hosts trip the circuit breaker early; host-spray otherwise.
pub fn resolve_strategy(
    strategy: ScanStrategy,
    template_count: usize,
    target_count: usize,
    ratio: f64,
) -> ScanStrategy {
    match strategy {
        ScanStrategy::Auto => {
            if target_count as f64 > template_count as f64 * ratio {
                ScanStrategy::TemplateSpray
            } else {
                ScanStrategy::HostSpray
            }
        }
        concrete => concrete,
    }
}

/// Work items sharing one outer-axis element
#[derive(Debug, Clone)]
pub struct OuterGroup {
    /// Template id (host-spray) or target (template-spray)
    pub key: String,
    pub items: Vec<WorkItem>,
}

/// Enumerated work for one scan run
#[derive(Debug, Clone)]
pub struct ScanPlan {
    strategy: ScanStrategy,
    lightweight: Vec<OuterGroup>,
    headless: Vec<OuterGroup>,
    total: usize,
}

impl ScanPlan {
    /// Enumerate `templates` x `targets` under a resolved strategy
    ///
    /// `auto` is resolved with the default crossover ratio; callers with a
    /// configured ratio resolve first.
    pub fn build(
        templates: &[Arc<Template>],
        targets: &[Arc<Target>],
        strategy: ScanStrategy,
    ) -> Self {
        let strategy = resolve_strategy(
            strategy,
            templates.len(),
            targets.len(),
            super::config::DEFAULT_AUTO_CROSSOVER_RATIO,
        );
        let mut plan = ScanPlan {
            strategy,
            lightweight: Vec::new(),
            headless: Vec::new(),
            total: 0,
        };
        let mut sequence = 0usize;
        let mut next_item = |template: &Arc<Template>, target: &Arc<Target>| {
            let item = WorkItem {
                template: Arc::clone(template),
                target: Arc::clone(target),
                sequence,
            };
            sequence += 1;
            item
        };

        match strategy {
            ScanStrategy::TemplateSpray => {
                for target in targets {
                    let mut light = Vec::new();
                    let mut heavy = Vec::new();
                    for template in templates {
                        let item = next_item(template, target);
                        match template.cost_class() {
                            CostClass::Lightweight => light.push(item),
                            CostClass::Headless => heavy.push(item),
                        }
                    }
                    plan.push_group(CostClass::Lightweight, &target.raw, light);
                    plan.push_group(CostClass::Headless, &target.raw, heavy);
                }
            }
            ScanStrategy::HostSpray | ScanStrategy::Auto => {
                for template in templates {
                    let items: Vec<WorkItem> =
                        targets.iter().map(|target| next_item(template, target)).collect();
                    plan.push_group(template.cost_class(), &template.id, items);
                }
            }
        }
        plan
    }

    pub fn strategy(&self) -> ScanStrategy {
        self.strategy
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn groups(&self, class: CostClass) -> &[OuterGroup] {
        match class {
            CostClass::Lightweight => &self.lightweight,
            CostClass::Headless => &self.headless,
        }
    }

    pub(crate) fn into_groups(self) -> (Vec<OuterGroup>, Vec<OuterGroup>) {
        (self.lightweight, self.headless)
    }

    /// Every work item in enumeration order
    pub fn work_items(&self) -> Vec<&WorkItem> {
        let mut items: Vec<&WorkItem> = self
            .lightweight
            .iter()
            .chain(self.headless.iter())
            .flat_map(|group| group.items.iter())
            .collect();
        items.sort_by_key(|item| item.sequence);
        items
    }

    fn push_group(&mut self, class: CostClass, key: &str, items: Vec<WorkItem>) {
        if items.is_empty() {
            return;
        }
        self.total += items.len();
        let group = OuterGroup {
            key: key.to_string(),
            items,
        };
        match class {
            CostClass::Lightweight => self.lightweight.push(group),
            CostClass::Headless => self.headless.push(group),
        }
    }
}
