/// How many teams of each size a section of `n` students splits into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamPlan {
    pub teams_of_4: usize,
    pub teams_of_3: usize,
    /// Set only for rosters that teams of 3 and 4 cannot cover: 1, 2 and 5 students.
    pub undersized: Option<usize>,
}

impl TeamPlan {
    /// Team capacities in id order: fours, then threes, then the undersized team.
    pub fn capacities(&self) -> Vec<usize> {
        let mut capacities = vec![4; self.teams_of_4];
        capacities.extend(std::iter::repeat(3).take(self.teams_of_3));
        capacities.extend(self.undersized);
        capacities
    }
}

pub fn plan(n: usize) -> TeamPlan {
    let (teams_of_4, teams_of_3, undersized) = match n {
        0 => (0, 0, None),
        1 | 2 => (0, 0, Some(n)),
        5 => (0, 1, Some(2)),
        _ => {
            let base = n / 4;
            match n % 4 {
                0 => (base, 0, None),
                1 => (base - 2, 3, None),
                2 => (base - 1, 2, None),
                _ => (base, 1, None),
            }
        }
    };

    TeamPlan {
        teams_of_4,
        teams_of_3,
        undersized,
    }
}
