/*!
Derived statistics and narrative rendering for the outputs of a tax/benefit
reform microsimulation.

The microsimulation writes six CSV datasets (budgetary, headcounts,
distributional, poverty, inequality, constituency). This crate turns the loose
rows of those files into typed records, derives the figures a reader needs
(headline years, worst-affected decile, hardest-hit constituencies, poverty
rate shifts) and renders them as a single HTML page.

The crate does no I/O: loading the files is left to the caller. See the
[`manual`] module for the expected file formats.

```
use impact_narrative::*;

let data = Datasets {
    budgetary: Some(vec![
        BudgetaryRecord { year: Year::from(2029), budgetary_impact_bn: 2.8 },
        BudgetaryRecord { year: Year::from(2030), budgetary_impact_bn: 3.1 },
    ]),
    ..Default::default()
};
let page = render_dashboard(&data, &PageOptions::default());
assert_eq!(page.state, PageState::Ready);
assert!(page.html.contains("£2.8 billion in 2029 and £3.1 billion in 2030"));
```
*/

mod config;
pub mod format;
pub mod manual;
mod narrative;
mod records;
pub mod scroll_spy;
mod stats;

use log::info;

pub use crate::config::*;
pub use crate::narrative::*;
pub use crate::records::*;
pub use crate::scroll_spy::SectionId;
pub use crate::stats::*;

/// Derives every statistic from the loaded datasets and renders the page.
pub fn render_dashboard(data: &Datasets, opts: &PageOptions) -> RenderedPage {
    info!(
        "render_dashboard: loaded {:?}, absent {:?}",
        data.loaded(),
        data.absent()
    );
    let stats = DerivedStats::compute(data);
    render_page(data, &stats, opts)
}
