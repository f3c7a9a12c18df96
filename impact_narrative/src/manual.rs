/*!

This is the long-form manual for `impact_narrative` and `impactdash`.

## Input files

The microsimulation run writes six CSV files, each with a header line. Columns
may appear in any order; columns not listed here are ignored. A `year` is
either a plain number (`2029`) or a fiscal-year label (`2029-30`); years are
ordered by their leading number.

### `budgetary.csv`

| column | meaning |
|--------|---------|
| `year` | projection year |
| `budgetary_impact_bn` | net saving to the government, in £ billion (negative: cost) |

The first and last years of this file are the two years the narrative
compares. Without any budgetary row, the page is not rendered beyond its
loading placeholder.

### `headcounts.csv`

Required: `year`, `affected_households`, `affected_children`,
`pct_children_affected`.

Optional: `total_households`, `total_people`, `affected_people`,
`total_children`, `pct_households_affected`, `pct_people_affected`,
`avg_loss_per_affected_hh`.

### `distributional.csv`

Required: `year`, `decile` (1 to 10), `avg_change_gbp`, `relative_change_pct`.

A decile whose average change is under £1 a year is considered unaffected.

### `poverty.csv`

Required: `year`, `group` (`Children` or `All`), `measure`
(`Absolute BHC`, `Absolute AHC`, `Relative BHC`, `Relative AHC`),
`baseline_rate_pct`, `reform_rate_pct`, `change_pp`. Optional: `change_pct`.

The page shows the change between the baseline and reform rates, each rounded
to one decimal place first. It may differ from `change_pp` by up to 0.1.

### `inequality.csv`

Required: `year`, `gini_change_pct`. Optional: `baseline_gini`, `reform_gini`.

### `constituency.csv`

Required: `year`, `constituency_name`, `avg_change_gbp`. Optional:
`constituency_code`, `relative_change_pct`.

## Failure modes

A file that cannot be fetched, that is not valid CSV, or whose header lacks a
required column is treated as absent: its section is left out of the page.
Rows that cannot be read are skipped with a warning. An empty file is treated
like an absent one.

## Quoting

Files are read as RFC 4180 CSV. A field that *starts* with `"` is quoted: it
may contain commas and line breaks, and a doubled `""` inside it stands for
one literal `"`. A quote anywhere else in a field is an ordinary character
and does not open a quoted region, so `ab"c,d"e` reads as the two fields
`ab"c` and `d"e`. Producers should quote whole fields, as pandas'
`to_csv` does.

## Configuration

`impactdash` reads an optional JSON file:

```json
{
  "outputSettings": {
    "title": "Reintroducing the two-child limit",
    "outputPath": "dist/index.html",
    "summaryPath": "dist/summary.json"
  },
  "dataSources": {
    "baseLocation": "public/data",
    "constituency": "constituency_2024.csv"
  },
  "charts": {
    "distributional": "charts/distributional.html",
    "constituencyMap": "charts/constituency_map.html"
  },
  "fetch": { "timeoutSeconds": 30 }
}
```

`baseLocation` is either a directory (relative paths are resolved against the
directory of the configuration file) or an `http://`/`https://` URL. Every
dataset file name defaults to `<dataset>.csv`.

*/
